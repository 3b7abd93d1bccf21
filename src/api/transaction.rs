// file: src/api/transaction.rs
// version: 1.0.0
// guid: e5a8b1c4-7d0f-4369-82e5-f8a1b4c7d0e3

//! Purchase transactions and the transaction-lifecycle tracker

use super::client::RobotClient;
use crate::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, FixedOffset};
use rand::RngCore;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// Fixed interval between transaction status fetches
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Which provider order resource a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEndpoint {
    /// Standard product orders
    Standard,
    /// Marketplace listings use a distinct order resource
    Market,
}

impl TransactionEndpoint {
    /// Path of the order resource used for creation and status fetches
    pub fn path(&self) -> &'static str {
        match self {
            TransactionEndpoint::Standard => "/order/server/transaction",
            TransactionEndpoint::Market => "/order/server_market/transaction",
        }
    }
}

/// Provider-reported transaction status. Only ever read from the provider;
/// never inferred locally. Terminal states are exactly `ready` and
/// `cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TransactionStatus {
    InProcess,
    Ready,
    Cancelled,
    Other(String),
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ready" => TransactionStatus::Ready,
            "cancelled" => TransactionStatus::Cancelled,
            "in process" | "in_process" | "in-process" => TransactionStatus::InProcess,
            _ => TransactionStatus::Other(s),
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::InProcess => "in process",
            TransactionStatus::Ready => "ready",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Other(s) => s,
        }
    }

    /// True for `ready` and `cancelled`; all other statuses are polled again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Ready | TransactionStatus::Cancelled)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider response envelope for a transaction
#[derive(Debug, Deserialize)]
struct TransactionEnvelope {
    transaction: TransactionRecord,
}

/// Raw transaction record as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub date: DateTime<FixedOffset>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub server_number: Option<u32>,
    #[serde(default)]
    pub server_ip: Option<String>,
}

/// Purchase payload submitted with an order; keeps the generated one-time
/// password used for first SSH access.
#[derive(Debug, Clone)]
pub struct OrderPayload {
    pub product_id: String,
    pub location: Option<String>,
    pub password: String,
    pub ipv4_addon: bool,
    pub test: bool,
}

impl OrderPayload {
    pub fn new(product_id: impl Into<String>, location: Option<String>) -> Self {
        Self {
            product_id: product_id.into(),
            location,
            password: generate_one_time_password(),
            ipv4_addon: true,
            test: false,
        }
    }

    /// Form-encode the payload for the order POST
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("product_id".to_string(), self.product_id.clone()),
            ("password".to_string(), self.password.clone()),
        ];
        if let Some(location) = &self.location {
            form.push(("location".to_string(), location.clone()));
        }
        if self.ipv4_addon {
            form.push(("addon[]".to_string(), "primary_ipv4".to_string()));
        }
        if self.test {
            form.push(("test".to_string(), "true".to_string()));
        }
        form
    }
}

/// Generate the URL-safe one-time password included in the order payload
pub fn generate_one_time_password() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A purchase order in flight
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub created_at: DateTime<FixedOffset>,
    pub status: TransactionStatus,
    pub server_number: Option<u32>,
    pub server_ip: Option<String>,
    pub payload: OrderPayload,
    pub endpoint: TransactionEndpoint,
}

impl Transaction {
    fn from_record(record: TransactionRecord, payload: OrderPayload, endpoint: TransactionEndpoint) -> Self {
        Self {
            id: record.id,
            created_at: record.date,
            status: record.status,
            server_number: record.server_number,
            server_ip: record.server_ip,
            payload,
            endpoint,
        }
    }

    /// Apply a fresh provider record to this transaction
    pub fn apply(&mut self, record: TransactionRecord) {
        self.created_at = record.date;
        self.status = record.status;
        self.server_number = record.server_number;
        self.server_ip = record.server_ip;
    }
}

/// Source of transaction status fetches; implemented by [`RobotClient`] and
/// mocked in tests.
pub trait TransactionSource {
    fn fetch_transaction(
        &self,
        endpoint: TransactionEndpoint,
        id: &str,
    ) -> impl std::future::Future<Output = Result<TransactionRecord>>;
}

impl TransactionSource for RobotClient {
    async fn fetch_transaction(
        &self,
        endpoint: TransactionEndpoint,
        id: &str,
    ) -> Result<TransactionRecord> {
        let value = self.get(&format!("{}/{}", endpoint.path(), id)).await?;
        let envelope: TransactionEnvelope = serde_json::from_value(value)?;
        Ok(envelope.transaction)
    }
}

/// Place an order and return the tracked transaction
pub async fn place_order(
    client: &RobotClient,
    payload: OrderPayload,
    endpoint: TransactionEndpoint,
) -> Result<Transaction> {
    info!("Generated temporary password: {}", payload.password);
    let value = client.post(endpoint.path(), &payload.to_form()).await?;
    let envelope: TransactionEnvelope = serde_json::from_value(value)?;
    info!("Transaction ID: {}", envelope.transaction.id);
    Ok(Transaction::from_record(envelope.transaction, payload, endpoint))
}

/// Polls a transaction until its provider-reported status is terminal.
///
/// The wait is intentionally unbounded: fixed interval, no backoff, no
/// iteration cap. The operator interrupts the process if it hangs. Fetch
/// failures are fatal to the run and are not retried.
pub struct TransactionTracker {
    interval: Duration,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self { interval: POLL_INTERVAL }
    }

    /// Override the poll interval; for tests
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Block until the transaction status is terminal and return it. A
    /// `cancelled` terminal status is reported but not raised here; every
    /// caller must branch explicitly on the returned status.
    pub async fn wait_for_terminal<S: TransactionSource>(
        &self,
        source: &S,
        transaction: &mut Transaction,
    ) -> Result<TransactionStatus> {
        loop {
            info!("Waiting for transaction {} to become ready...", transaction.id);
            debug!("Current status: {}", transaction.status);

            match &transaction.status {
                TransactionStatus::Ready => {
                    info!("Transaction {} ready", transaction.id);
                    return Ok(TransactionStatus::Ready);
                }
                TransactionStatus::Cancelled => {
                    error!("Transaction {} cancelled", transaction.id);
                    return Ok(TransactionStatus::Cancelled);
                }
                _ => {}
            }

            tokio::time::sleep(self.interval).await;
            let record = source
                .fetch_transaction(transaction.endpoint, &transaction.id)
                .await?;
            transaction.apply(record);
        }
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}
