// file: src/provision/orchestrator.rs
// version: 1.0.0
// guid: f2b5c8d1-4e7a-4036-97f2-b5c8d1e4a7b0

//! The bootstrap state machine
//!
//! Drives two remote shell sessions per host: a rescue session on the
//! standard port (the ephemeral install environment) and the rescue tool on
//! its alternate port, then the post-install target session. Phases run in
//! a fixed order; the two readiness waits degrade and continue on timeout
//! instead of aborting, which is a deliberate policy and surfaces as a
//! named outcome in the report.

use super::disk::{self, POOL_DISKS, POOL_NAME};
use crate::api::ServerDirectory;
use crate::api::Server;
use crate::config::template::{self, InstallFacts};
use crate::config::Settings;
use crate::network::{PortProbe, ProbeOutcome, RemoteShell, SshAuth, SshSession};
use crate::network::{RESCUE_PORT, SSH_PORT};
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed username of the rescue tool
pub const RESCUE_USER: &str = "mfsbsd";

/// Patience for the rescue tool to come up
const RESCUE_READY_PATIENCE: Duration = Duration::from_secs(300);
/// Patience for the installed target system to come up
const TARGET_READY_PATIENCE: Duration = Duration::from_secs(600);
/// Interval between reachability checks
const PROBE_INTERVAL: Duration = Duration::from_secs(5);
/// Heuristic install-completion wait; there is no actual completion signal
const INSTALL_SETTLE: Duration = Duration::from_secs(60);
/// Grace period after issuing the reboot before probing
const REBOOT_SETTLE: Duration = Duration::from_secs(10);

/// Remote name the installer configuration is staged under
const SETTINGS_FILE: &str = "installer_settings.sh";
/// Installer binary run from the rescue tool
const INSTALLER_COMMAND: &str = "cd /root && sudo ./installer_bsdinstall.sh";

/// Ordered progress marker for one orchestration run. Process-local only;
/// a killed run restarts from `RescuePending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapPhase {
    RescuePending,
    RescueReady,
    PoolWiped,
    ConfigStaged,
    Installing,
    Rebooting,
    HandoffReady,
}

impl BootstrapPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapPhase::RescuePending => "rescue-pending",
            BootstrapPhase::RescueReady => "rescue-ready",
            BootstrapPhase::PoolWiped => "pool-wiped",
            BootstrapPhase::ConfigStaged => "config-staged",
            BootstrapPhase::Installing => "installing",
            BootstrapPhase::Rebooting => "rebooting",
            BootstrapPhase::HandoffReady => "handoff-ready",
        }
    }
}

impl std::fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run inputs that are not part of the stable configuration
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// One-time password for the rescue session; key auth when absent
    pub rescue_password: Option<String>,
    /// Pre-rendered installer configuration (required in direct mode)
    pub installer_config: Option<PathBuf>,
}

/// What one orchestration run achieved
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Last phase reached
    pub phase: BootstrapPhase,
    /// Outcome of the rescue-tool readiness wait
    pub rescue_probe: ProbeOutcome,
    /// Outcome of the final target readiness wait
    pub target_probe: ProbeOutcome,
    /// Operator-facing connection endpoints, populated on handoff
    pub endpoints: Vec<String>,
}

/// Operator-facing connection endpoints: IPv4 always, IPv6 when the server
/// carries a provider-reported prefix.
pub fn connection_endpoints(user: &str, server: &Server) -> Vec<String> {
    let mut endpoints = vec![format!("{}@{}", user, server.ip)];
    if let Some(net) = &server.ipv6_net {
        endpoints.push(format!("{}@{}2", user, net));
    }
    endpoints
}

/// Build the rescue-session command that downloads and launches the network
/// installer. The image mirror changes the invocation shape, not its
/// semantics.
pub fn installer_kickoff_command(settings: &Settings) -> Result<String> {
    let run_url = settings.run_url.as_deref().ok_or_else(|| {
        crate::error::ProvisionError::config("run_url is not configured; set it in the config file")
    })?;

    Ok(match &settings.image_url {
        Some(mirror) => format!(
            "wget -O run.sh {} && chmod +x run.sh && ./run.sh -m {} -d {}",
            run_url, mirror, settings.authorized_keys
        ),
        None => format!(
            "wget -O run.sh {} && chmod +x run.sh && ./run.sh -d {}",
            run_url, settings.authorized_keys
        ),
    })
}

/// Transport seam for the orchestrator: opens remote shell sessions and
/// answers reachability waits. Production drives real SSH and TCP; tests
/// script both sides.
pub trait BootstrapTransport {
    type Shell: RemoteShell;

    fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        auth: &SshAuth,
    ) -> impl std::future::Future<Output = Result<Self::Shell>>;

    fn wait_reachable(
        &self,
        host: &str,
        port: u16,
        patience: Duration,
        interval: Duration,
    ) -> impl std::future::Future<Output = ProbeOutcome>;
}

/// Production transport: [`SshSession`] shells and [`PortProbe`] waits
#[derive(Debug, Clone, Copy, Default)]
pub struct SshTransport;

impl BootstrapTransport for SshTransport {
    type Shell = SshSession;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        auth: &SshAuth,
    ) -> Result<SshSession> {
        SshSession::connect(host, port, username, auth).await
    }

    async fn wait_reachable(
        &self,
        host: &str,
        port: u16,
        patience: Duration,
        interval: Duration,
    ) -> ProbeOutcome {
        PortProbe::new().wait(host, port, patience, interval).await
    }
}

/// The multi-phase bootstrap state machine
pub struct BootstrapOrchestrator<'a, T = SshTransport> {
    settings: &'a Settings,
    directory: Option<&'a ServerDirectory<'a>>,
    transport: T,
}

impl<'a> BootstrapOrchestrator<'a> {
    /// `directory` is present in provider mode and enables installer-config
    /// rendering from the server's network facts.
    pub fn new(settings: &'a Settings, directory: Option<&'a ServerDirectory<'a>>) -> Self {
        Self::with_transport(settings, directory, SshTransport)
    }
}

impl<'a, T: BootstrapTransport> BootstrapOrchestrator<'a, T> {
    /// Build an orchestrator over an explicit transport
    pub fn with_transport(
        settings: &'a Settings,
        directory: Option<&'a ServerDirectory<'a>>,
        transport: T,
    ) -> Self {
        Self {
            settings,
            directory,
            transport,
        }
    }

    /// Run all phases against a resolved server. Re-running after an
    /// interrupted run starts over from the first phase; there is no
    /// checkpoint.
    pub async fn run(&self, server: &Server, options: &BootstrapOptions) -> Result<BootstrapReport> {
        let mut phase = BootstrapPhase::RescuePending;
        info!("Starting bootstrap for {} (phase: {})", server.ip, phase);

        // Phase 1: rescue connect. Password auth when a one-time password
        // was supplied, else the SSH agent. Failure aborts the run.
        let auth = match &options.rescue_password {
            Some(password) => SshAuth::Password(password.clone()),
            None => SshAuth::Agent,
        };
        let mut rescue = self.transport.connect(&server.ip, SSH_PORT, "root", &auth).await?;

        // Phase 2: kick off the network installer
        info!("Starting network installer...");
        let kickoff = installer_kickoff_command(self.settings)?;
        let output = rescue.exec(&kickoff).await?;
        debug!("Installer kickoff: {}", output.stdout.trim());

        // Phase 3: wait for the rescue tool. Timeout degrades and continues.
        let rescue_probe = self
            .transport
            .wait_reachable(&server.ip, RESCUE_PORT, RESCUE_READY_PATIENCE, PROBE_INTERVAL)
            .await;
        if rescue_probe.is_reachable() {
            phase = BootstrapPhase::RescueReady;
            info!("Rescue tool is up (phase: {})", phase);
        } else {
            warn!(
                "Rescue tool on {} did not come up within {} seconds; continuing anyway",
                server.ip,
                RESCUE_READY_PATIENCE.as_secs()
            );
        }

        // Phases 4-6 run over a separate session to the rescue tool
        {
            let mut tool = self
                .transport
                .connect(&server.ip, RESCUE_PORT, RESCUE_USER, &SshAuth::Agent)
                .await?;

            // Phase 4: destroy prior disk state
            disk::wipe_pool(&mut tool, POOL_NAME, &POOL_DISKS).await?;
            phase = BootstrapPhase::PoolWiped;
            info!("Storage pool cleared (phase: {})", phase);

            // Phase 5: stage the installer configuration
            let config_path = self.resolve_installer_config(server, options).await?;
            info!("Uploading installer config...");
            tool.upload(&config_path, SETTINGS_FILE).await?;
            let output = tool
                .exec(&format!(
                    "sudo mv {file} /root/ && sudo chmod +x /root/{file}",
                    file = SETTINGS_FILE
                ))
                .await?;
            debug!("Stage settings: {}", output.stdout.trim());
            phase = BootstrapPhase::ConfigStaged;
            info!("Installer config staged (phase: {})", phase);

            // Phase 6: run the installer
            phase = BootstrapPhase::Installing;
            info!("Running installer (phase: {})", phase);
            let output = tool.exec(INSTALLER_COMMAND).await?;
            debug!("Installer: {}", output.stdout.trim());

            tool.disconnect();
        }

        // Phase 7: heuristic completion wait, then reboot over the original
        // rescue session
        phase = BootstrapPhase::Rebooting;
        info!("Waiting until the install is finished... (phase: {})", phase);
        tokio::time::sleep(INSTALL_SETTLE).await;
        info!("Rebooting host...");
        rescue.exec("reboot").await?;
        rescue.disconnect();
        tokio::time::sleep(REBOOT_SETTLE).await;

        // Phase 8: wait for the target system and hand off
        let target_probe = self
            .transport
            .wait_reachable(&server.ip, SSH_PORT, TARGET_READY_PATIENCE, PROBE_INTERVAL)
            .await;

        let mut endpoints = Vec::new();
        if target_probe.is_reachable() {
            if let Some(hook) = &self.settings.post_provision {
                self.run_post_provision(server, hook).await?;
            }
            endpoints = connection_endpoints(&self.settings.ssh_user, server);
            for endpoint in &endpoints {
                info!("Connect to: {}", endpoint);
            }
            phase = BootstrapPhase::HandoffReady;
            info!("Bootstrap finished (phase: {})", phase);
        } else {
            warn!(
                "Target system on {} did not come up within {} seconds; no handoff confirmation",
                server.ip,
                TARGET_READY_PATIENCE.as_secs()
            );
        }

        Ok(BootstrapReport {
            phase,
            rescue_probe,
            target_probe,
            endpoints,
        })
    }

    /// Provider mode renders the config from the template and the server's
    /// network facts; direct mode requires an operator-supplied file.
    async fn resolve_installer_config(
        &self,
        server: &Server,
        options: &BootstrapOptions,
    ) -> Result<PathBuf> {
        if let Some(path) = &options.installer_config {
            return Ok(path.clone());
        }

        let directory = self.directory.ok_or_else(|| {
            crate::error::ProvisionError::config(
                "direct mode needs --installer-config; there is no provider to render one from",
            )
        })?;

        let ip_record = directory.ip_record(&server.ip).await?;
        let gateway = ip_record.gateway.ok_or_else(|| {
            crate::error::ProvisionError::api(format!(
                "provider returned no gateway for {}",
                server.ip
            ))
        })?;

        let facts = InstallFacts {
            ip: server.ip.clone(),
            gateway,
            ip6: server
                .ipv6_net
                .as_ref()
                .map(|net| format!("{}2", net))
                .unwrap_or_default(),
            name: server
                .name
                .clone()
                .unwrap_or_else(|| self.settings.hostname.clone()),
            user: self.settings.ssh_user.clone(),
        };
        template::render_to_file(&self.settings.installer_config_dir, &facts)
    }

    /// Fetch and execute the post-provision hook over a fresh target session
    async fn run_post_provision(&self, server: &Server, hook_url: &str) -> Result<()> {
        let mut target = self
            .transport
            .connect(&server.ip, SSH_PORT, &self.settings.ssh_user, &SshAuth::Agent)
            .await?;

        info!("Downloading post-provision script");
        let output = target
            .exec(&format!("fetch -o post-provision.sh {}", hook_url))
            .await?;
        debug!("fetch output: {}", output.stdout.trim());

        info!("Executing post-provision.sh");
        let output = target.exec("sudo sh post-provision.sh").await?;
        debug!("post-provision output: {}", output.stdout.trim());

        target.disconnect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SettingsOverrides};
    use crate::config::loader::{FileConfig, FileSection};

    fn settings(image_url: Option<&str>) -> Settings {
        let file = FileConfig {
            default: Some(FileSection {
                ssh_user: Some("admin".to_string()),
                authorized_keys: Some("https://example.com/keys".to_string()),
                run_url: Some("https://example.com/run.sh".to_string()),
                image_url: image_url.map(|s| s.to_string()),
                ..FileSection::default()
            }),
            provider: None,
        };
        Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap()
    }

    #[test]
    fn test_direct_mode_endpoint_is_ipv4_only() {
        let server = Server::from_ip("203.0.113.5");
        let endpoints = connection_endpoints("admin", &server);
        assert_eq!(endpoints, vec!["admin@203.0.113.5".to_string()]);
    }

    #[test]
    fn test_provider_mode_adds_ipv6_endpoint() {
        let mut server = Server::from_ip("203.0.113.5");
        server.ipv6_net = Some("2001:db8:0:1::".to_string());
        let endpoints = connection_endpoints("admin", &server);
        assert_eq!(
            endpoints,
            vec![
                "admin@203.0.113.5".to_string(),
                "admin@2001:db8:0:1::2".to_string(),
            ]
        );
    }

    #[test]
    fn test_kickoff_command_without_mirror() {
        let command = installer_kickoff_command(&settings(None)).unwrap();
        assert_eq!(
            command,
            "wget -O run.sh https://example.com/run.sh && chmod +x run.sh && ./run.sh -d https://example.com/keys"
        );
    }

    #[test]
    fn test_kickoff_command_with_mirror() {
        let command =
            installer_kickoff_command(&settings(Some("https://mirror.example.com/img"))).unwrap();
        assert!(command.contains("-m https://mirror.example.com/img"));
        assert!(command.ends_with("-d https://example.com/keys"));
    }

    #[test]
    fn test_kickoff_requires_run_url() {
        let mut s = settings(None);
        s.run_url = None;
        let err = installer_kickoff_command(&s).unwrap_err();
        assert!(err.to_string().contains("run_url"));
    }

    #[test]
    fn test_phase_ordering() {
        assert!(BootstrapPhase::RescuePending < BootstrapPhase::RescueReady);
        assert!(BootstrapPhase::PoolWiped < BootstrapPhase::ConfigStaged);
        assert!(BootstrapPhase::Rebooting < BootstrapPhase::HandoffReady);
        assert_eq!(BootstrapPhase::HandoffReady.as_str(), "handoff-ready");
    }

    use crate::network::CommandOutput;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Shell that records every command into a shared log
    struct ScriptedShell {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RemoteShell for ScriptedShell {
        async fn exec(&mut self, command: &str) -> crate::Result<CommandOutput> {
            self.log.lock().unwrap().push(command.to_string());
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_status: 0,
            })
        }

        async fn upload(&mut self, local: &Path, remote: &str) -> crate::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("upload {} {}", local.display(), remote));
            Ok(())
        }
    }

    /// Transport whose sessions record commands and whose reachability
    /// waits return a scripted sequence of outcomes
    struct ScriptedTransport {
        log: Arc<Mutex<Vec<String>>>,
        probes: Mutex<VecDeque<ProbeOutcome>>,
    }

    impl ScriptedTransport {
        fn new(probes: Vec<ProbeOutcome>) -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
                probes: Mutex::new(probes.into_iter().collect()),
            }
        }
    }

    impl BootstrapTransport for ScriptedTransport {
        type Shell = ScriptedShell;

        async fn connect(
            &self,
            host: &str,
            port: u16,
            username: &str,
            _auth: &SshAuth,
        ) -> crate::Result<ScriptedShell> {
            self.log
                .lock()
                .unwrap()
                .push(format!("connect {}:{} {}", host, port, username));
            Ok(ScriptedShell {
                log: Arc::clone(&self.log),
            })
        }

        async fn wait_reachable(
            &self,
            _host: &str,
            _port: u16,
            _patience: Duration,
            _interval: Duration,
        ) -> ProbeOutcome {
            self.probes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProbeOutcome::Reachable)
        }
    }

    fn scripted_options() -> BootstrapOptions {
        BootstrapOptions {
            rescue_password: Some("hunter2".to_string()),
            installer_config: Some(PathBuf::from("install_203.0.113.5.txt")),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_wipes_and_installs_after_rescue_wait_timeout() {
        let transport =
            ScriptedTransport::new(vec![ProbeOutcome::TimedOut, ProbeOutcome::TimedOut]);
        let log = Arc::clone(&transport.log);
        let settings = settings(None);
        let orchestrator = BootstrapOrchestrator::with_transport(&settings, None, transport);
        let server = Server::from_ip("203.0.113.5");

        let report = orchestrator
            .run(&server, &scripted_options())
            .await
            .unwrap();

        // Both waits time out; the run still drives every install phase
        assert_eq!(report.rescue_probe, ProbeOutcome::TimedOut);
        assert_eq!(report.target_probe, ProbeOutcome::TimedOut);
        assert_eq!(report.phase, BootstrapPhase::Rebooting);
        assert!(report.endpoints.is_empty());

        let log = log.lock().unwrap();
        assert!(log.iter().any(|c| c == "sudo zpool export -f zroot"));
        assert!(log
            .iter()
            .any(|c| c == "upload install_203.0.113.5.txt installer_settings.sh"));
        assert!(log.iter().any(|c| c == INSTALLER_COMMAND));
        assert!(log.iter().any(|c| c == "reboot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reaches_handoff_when_target_comes_up() {
        let transport =
            ScriptedTransport::new(vec![ProbeOutcome::Reachable, ProbeOutcome::Reachable]);
        let log = Arc::clone(&transport.log);
        let settings = settings(None);
        let orchestrator = BootstrapOrchestrator::with_transport(&settings, None, transport);
        let server = Server::from_ip("203.0.113.5");

        let report = orchestrator
            .run(&server, &scripted_options())
            .await
            .unwrap();

        assert_eq!(report.phase, BootstrapPhase::HandoffReady);
        assert_eq!(report.rescue_probe, ProbeOutcome::Reachable);
        assert_eq!(report.target_probe, ProbeOutcome::Reachable);
        assert_eq!(report.endpoints, vec!["admin@203.0.113.5".to_string()]);

        let log = log.lock().unwrap();
        assert!(log.iter().any(|c| c == "connect 203.0.113.5:22 root"));
        assert!(log.iter().any(|c| c == "connect 203.0.113.5:1022 mfsbsd"));
    }
}
