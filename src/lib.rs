// file: src/lib.rs
// version: 1.0.0
// guid: 4c7e9a1b-2d5f-4e83-8a06-91b4d2c7f350

//! # Bare-Metal Provision Agent
//!
//! Automates bare-metal server provisioning against a hosting provider:
//! purchases or locates a physical machine, boots it into a minimal rescue
//! environment, destroys prior disk state, installs the target operating
//! system via a network installer, and hands the machine off with an
//! optional post-provision hook.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod provision;

pub use error::{ProvisionError, Result};

/// Version information for the agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
