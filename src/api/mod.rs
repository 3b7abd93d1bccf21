// file: src/api/mod.rs
// version: 1.0.0
// guid: a1b4c7d0-2e5f-4816-93a2-b5c8d1e4f709

//! Provider REST API operations
//!
//! All provider interaction goes through [`RobotClient`]; in direct mode no
//! client exists and code paths that would need one are unreachable by
//! construction.

pub mod client;
pub mod product;
pub mod server;
pub mod transaction;

pub use client::RobotClient;
pub use product::ProductRecord;
pub use server::{Server, ServerDirectory};
pub use transaction::{
    OrderPayload, Transaction, TransactionEndpoint, TransactionSource, TransactionStatus,
    TransactionTracker,
};
