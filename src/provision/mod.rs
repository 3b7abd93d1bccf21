// file: src/provision/mod.rs
// version: 1.0.0
// guid: d0f3a6b9-2c5e-4814-a5d0-f3a6b9c2e5f8

//! Bootstrap orchestration: rescue boot, pool wipe, install, reboot, handoff

pub mod disk;
pub mod orchestrator;

pub use orchestrator::{
    connection_endpoints, BootstrapOptions, BootstrapOrchestrator, BootstrapPhase, BootstrapReport,
    BootstrapTransport, SshTransport,
};
