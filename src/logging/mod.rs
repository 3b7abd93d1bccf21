// file: src/logging/mod.rs
// version: 1.0.0
// guid: 9e2f4a6c-1b3d-4e5f-8790-a1b2c3d4e5f6

//! Logging setup

pub mod logger;
