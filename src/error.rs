// file: src/error.rs
// version: 1.0.0
// guid: b3f1c2d4-8a5e-4f06-9b21-7c3d5e8f0a12

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Error types for the provision agent
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API response parse error: {0}")]
    ApiParse(#[from] serde_json::Error),

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transaction {0} was cancelled by the provider")]
    TransactionCancelled(String),
}

impl ProvisionError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new provider API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create a new SSH error
    pub fn ssh(msg: impl Into<String>) -> Self {
        Self::Ssh(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_build_matching_variants() {
        assert!(matches!(ProvisionError::config("x"), ProvisionError::Config(_)));
        assert!(matches!(ProvisionError::api("x"), ProvisionError::Api(_)));
        assert!(matches!(ProvisionError::ssh("x"), ProvisionError::Ssh(_)));
        assert!(matches!(
            ProvisionError::validation("x"),
            ProvisionError::Validation(_)
        ));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ProvisionError::config("bad value").to_string(),
            "Configuration error: bad value"
        );
        assert_eq!(
            ProvisionError::TransactionCancelled("B1".to_string()).to_string(),
            "Transaction B1 was cancelled by the provider"
        );
    }
}
