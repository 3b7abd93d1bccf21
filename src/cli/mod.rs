// file: src/cli/mod.rs
// version: 1.0.0
// guid: a3c6d9e2-5f8b-4147-a8a3-c6d9e2f5b8c1

//! Command line interface

pub mod args;
pub mod commands;
