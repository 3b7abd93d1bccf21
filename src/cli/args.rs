// file: src/cli/args.rs
// version: 1.0.0
// guid: b4d7e0f3-6a9c-4258-b9b4-d7e0f3a6c9d2

//! Command line argument definitions

use crate::config::SettingsOverrides;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "baremetal-provision-agent")]
#[command(about = "Automated bare-metal server provisioning via rescue-system installs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(short, long, global = true, help = "Path to the TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, global = true, help = "Bypass the provider API and drive SSH directly")]
    pub direct: bool,

    #[arg(long, global = true, help = "User that gets added to the target system")]
    pub ssh_user: Option<String>,

    #[arg(long, global = true, help = "Authorized-keys reference handed to the installer")]
    pub authorized_keys: Option<String>,

    #[arg(long, global = true, help = "Hostname to give to the host")]
    pub hostname: Option<String>,

    #[arg(
        long,
        global = true,
        help = "URL to a script that gets downloaded and executed after the server is provisioned"
    )]
    pub post_provision: Option<String>,

    #[arg(long, global = true, help = "Provider webservice user")]
    pub api_user: Option<String>,

    #[arg(long, global = true, help = "Provider webservice password")]
    pub api_password: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Order a new server and provision it
    Order {
        /// Product identifier to order
        product: String,

        #[arg(short, long, help = "Location for the new host")]
        location: Option<String>,

        #[arg(long, help = "Don't order the IPv4 addon")]
        no_ipv4: bool,

        #[arg(long, help = "Place a test order only")]
        noop: bool,
    },

    /// Buy a server from the marketplace and provision it
    Market {
        /// Marketplace listing identifier
        listing: String,

        #[arg(long, help = "Don't order the IPv4 addon")]
        no_ipv4: bool,

        #[arg(long, help = "Place a test order only")]
        noop: bool,
    },

    /// List available products and prices
    ListProducts,

    /// Provision an existing server by IP
    Provision {
        /// IP address of the server to provision
        ip: String,

        #[arg(long, help = "SSH password to connect to the rescue system")]
        ssh_pass: Option<String>,

        #[arg(
            long,
            help = "Pre-rendered installer config file (required with --direct)"
        )]
        installer_config: Option<String>,
    },
}

impl Cli {
    /// Collect the explicitly supplied flags that override file settings
    pub fn overrides(&self) -> SettingsOverrides {
        let location = match &self.command {
            Commands::Order { location, .. } => location.clone(),
            _ => None,
        };

        SettingsOverrides {
            ssh_user: self.ssh_user.clone(),
            authorized_keys: self.authorized_keys.clone(),
            hostname: self.hostname.clone(),
            location,
            post_provision: self.post_provision.clone(),
            api_user: self.api_user.clone(),
            api_password: self.api_password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provision() {
        let cli = Cli::try_parse_from([
            "baremetal-provision-agent",
            "provision",
            "203.0.113.5",
            "--ssh-pass",
            "hunter2",
            "--direct",
            "--installer-config",
            "install_203.0.113.5.txt",
        ])
        .unwrap();

        assert!(cli.direct);
        match cli.command {
            Commands::Provision {
                ip,
                ssh_pass,
                installer_config,
            } => {
                assert_eq!(ip, "203.0.113.5");
                assert_eq!(ssh_pass.as_deref(), Some("hunter2"));
                assert_eq!(installer_config.as_deref(), Some("install_203.0.113.5.txt"));
            }
            _ => panic!("expected provision command"),
        }
    }

    #[test]
    fn test_parse_order_with_location() {
        let cli = Cli::try_parse_from([
            "baremetal-provision-agent",
            "order",
            "EX44",
            "--location",
            "HEL1",
            "--no-ipv4",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.location.as_deref(), Some("HEL1"));
        match cli.command {
            Commands::Order { product, no_ipv4, noop, .. } => {
                assert_eq!(product, "EX44");
                assert!(no_ipv4);
                assert!(!noop);
            }
            _ => panic!("expected order command"),
        }
    }

    #[test]
    fn test_global_overrides_collected() {
        let cli = Cli::try_parse_from([
            "baremetal-provision-agent",
            "--ssh-user",
            "admin",
            "--hostname",
            "metal-7",
            "list-products",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.ssh_user.as_deref(), Some("admin"));
        assert_eq!(overrides.hostname.as_deref(), Some("metal-7"));
        assert!(overrides.location.is_none());
    }
}
