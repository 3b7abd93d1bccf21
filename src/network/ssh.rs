// file: src/network/ssh.rs
// version: 1.0.0
// guid: c9e2f5a8-1b4d-4703-94c9-e2f5a8b1d4e7

//! SSH sessions for rescue and target hosts

use crate::Result;
use ssh2::Session;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, info};

/// Authentication method for a remote shell session
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Key-based authentication via the SSH agent (default)
    Agent,
    /// Password authentication; used for the rescue session's one-time
    /// credential
    Password(String),
}

/// Captured output of one remote command. The session never interprets exit
/// codes itself; callers decide what a non-zero status means.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// Remote shell capability: execute a command, transfer a file. Implemented
/// by [`SshSession`]; phase logic stays generic over this so tests can
/// record the issued commands.
pub trait RemoteShell {
    fn exec(&mut self, command: &str) -> impl std::future::Future<Output = Result<CommandOutput>>;
    fn upload(
        &mut self,
        local: &Path,
        remote: &str,
    ) -> impl std::future::Future<Output = Result<()>>;

    /// Release the underlying connection; no-op for shells that hold none
    fn disconnect(&mut self) {}
}

/// A scoped SSH session. Explicitly disconnected on every exit path; `Drop`
/// guarantees release when an error unwinds past the owner.
pub struct SshSession {
    session: Option<Session>,
    host: String,
    port: u16,
}

impl SshSession {
    /// Connect and authenticate. Connection failure is fatal by policy; the
    /// caller propagates it and the run aborts with a non-zero exit.
    pub async fn connect(host: &str, port: u16, username: &str, auth: &SshAuth) -> Result<Self> {
        info!("Connecting to {}:{} as {}", host, port, username);

        let tcp = TcpStream::connect(format!("{}:{}", host, port)).map_err(|e| {
            crate::error::ProvisionError::ssh(format!(
                "Failed to connect to {}:{}: {}",
                host, port, e
            ))
        })?;

        let mut session = Session::new().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to create SSH session: {}", e))
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("SSH handshake failed: {}", e))
        })?;

        match auth {
            SshAuth::Password(password) => {
                session.userauth_password(username, password).map_err(|e| {
                    crate::error::ProvisionError::ssh(format!(
                        "Password authentication failed: {}",
                        e
                    ))
                })?;
            }
            SshAuth::Agent => {
                session.userauth_agent(username).map_err(|e| {
                    crate::error::ProvisionError::ssh(format!(
                        "Agent authentication failed: {}",
                        e
                    ))
                })?;
            }
        }

        if !session.authenticated() {
            return Err(crate::error::ProvisionError::ssh("SSH authentication failed"));
        }

        info!("SSH connection established to {}:{}", host, port);
        Ok(Self {
            session: Some(session),
            host: host.to_string(),
            port,
        })
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or_else(|| {
            crate::error::ProvisionError::ssh("No active SSH session")
        })
    }

    /// Disconnect the session; safe to call more than once
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "", None);
            debug!("SSH session to {}:{} disconnected", self.host, self.port);
        }
    }
}

impl RemoteShell for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        debug!("Executing command: {}", command);

        let session = self.session()?;
        let mut channel = session.channel_session().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to create SSH channel: {}", e))
        })?;

        channel.exec(command).map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to execute command: {}", e))
        })?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        channel.read_to_string(&mut stdout).map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to read stdout: {}", e))
        })?;
        channel.stderr().read_to_string(&mut stderr).map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to read stderr: {}", e))
        })?;

        channel.wait_close().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to close SSH channel: {}", e))
        })?;
        let exit_status = channel.exit_status().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to get exit status: {}", e))
        })?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    async fn upload(&mut self, local: &Path, remote: &str) -> Result<()> {
        info!(
            "Uploading {} to {}:{}",
            local.display(),
            self.host,
            remote
        );

        let content = std::fs::read(local)?;
        let session = self.session()?;

        let mut remote_file = session
            .scp_send(Path::new(remote), 0o644, content.len() as u64, None)
            .map_err(|e| {
                crate::error::ProvisionError::ssh(format!("Failed to create SCP channel: {}", e))
            })?;

        remote_file.write_all(&content).map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to write file data: {}", e))
        })?;
        remote_file.send_eof().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to send EOF: {}", e))
        })?;
        remote_file.wait_eof().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to wait for EOF: {}", e))
        })?;
        remote_file.close().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to close remote file: {}", e))
        })?;
        remote_file.wait_close().map_err(|e| {
            crate::error::ProvisionError::ssh(format!("Failed to wait for close: {}", e))
        })?;

        info!("File upload completed");
        Ok(())
    }

    fn disconnect(&mut self) {
        SshSession::disconnect(self)
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_ssh_error() {
        // Bind then drop for a port that is very likely closed
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = SshSession::connect("127.0.0.1", port, "root", &SshAuth::Agent).await;
        match result {
            Err(crate::error::ProvisionError::Ssh(msg)) => {
                assert!(msg.contains("Failed to connect"))
            }
            other => panic!("expected SSH error, got {:?}", other.map(|_| ())),
        }
    }
}
