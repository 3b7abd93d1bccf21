// file: src/network/probe.rs
// version: 1.0.0
// guid: b8d1e4f7-0a3c-4692-83b8-d1e4f7a0c3d6

//! TCP reachability probing with a bounded patience window

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Timeout for a single connect attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a patience-bounded reachability wait.
///
/// A timeout is a named outcome rather than an error: the orchestrator's
/// degrade-and-continue policy treats it as something to log and test, not
/// something to abort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// Polls TCP reachability of a host:port. Pure and side-effect free; every
/// connect attempt carries its own timeout, so no ambient socket state is
/// ever touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortProbe;

impl PortProbe {
    pub fn new() -> Self {
        Self
    }

    /// Single bounded connect attempt
    pub fn check(&self, host: &str, port: u16) -> bool {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Failed to resolve {}:{}: {}", host, port, e);
                return false;
            }
        };

        for addr in addrs {
            if TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok() {
                return true;
            }
        }
        false
    }

    /// Poll until the port is reachable or the patience window elapses
    pub async fn wait(
        &self,
        host: &str,
        port: u16,
        patience: Duration,
        interval: Duration,
    ) -> ProbeOutcome {
        info!("Waiting for {} to respond on port {}...", host, port);
        let start = Instant::now();

        loop {
            if start.elapsed() > patience {
                info!(
                    "Server {} did not come up after {} seconds",
                    host,
                    patience.as_secs()
                );
                return ProbeOutcome::TimedOut;
            }
            if self.check(host, port) {
                info!("Server {} became available", host);
                return ProbeOutcome::Reachable;
            }
            tokio::time::sleep(interval).await;
        }
    }
}
