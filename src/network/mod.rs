// file: src/network/mod.rs
// version: 1.0.0
// guid: a7c0d3e6-9f2b-4581-b2a7-c0d3e6f9a2b5

//! Remote shell sessions and reachability probing

pub mod probe;
pub mod ssh;

pub use probe::{PortProbe, ProbeOutcome};
pub use ssh::{CommandOutput, RemoteShell, SshAuth, SshSession};

/// Standard SSH port of the target operating system
pub const SSH_PORT: u16 = 22;

/// Fixed alternate port of the rescue tool
pub const RESCUE_PORT: u16 = 1022;
