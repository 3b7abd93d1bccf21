// file: src/cli/commands.rs
// version: 1.0.0
// guid: c5e8f1a4-7b0d-4369-8ac5-e8f1a4b7d0e3

//! Command implementations for the CLI

use crate::{
    api::{
        product, transaction, RobotClient, Server, ServerDirectory, TransactionEndpoint,
        TransactionStatus, TransactionTracker,
    },
    config::Settings,
    network::{PortProbe, SSH_PORT},
    provision::{BootstrapOptions, BootstrapOrchestrator},
    Result,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Patience for the rescue system to answer SSH before bootstrap starts
const RESCUE_SYSTEM_PATIENCE: Duration = Duration::from_secs(300);
const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Grace period before placing an order that carries setup fees
const SETUP_FEE_GRACE: Duration = Duration::from_secs(30);

/// List available products with per-location prices
pub async fn list_products_command(client: &RobotClient) -> Result<()> {
    let products = product::list_products(client).await?;

    for product in &products {
        for location in &product.locations {
            if let Some(price) = product.price_at(location) {
                println!(
                    "{} is available in {}: {} ({} Setup)",
                    product.id, location, price.price.gross, price.price_setup.gross
                );
            }
        }
    }

    Ok(())
}

/// Order a new server, wait for the transaction, then bootstrap it
pub async fn order_command(
    settings: &Settings,
    client: &RobotClient,
    product_id: &str,
    ipv4_addon: bool,
    noop: bool,
) -> Result<()> {
    // Warn about setup fees before committing to the order
    let products = product::list_products(client).await?;
    if let Some(record) = products.iter().find(|p| p.id == product_id) {
        if let Some(fee) = record.setup_fee_at(&settings.location) {
            if fee > 0.0 {
                warn!("Setup fees ahead!");
                warn!(
                    "This type has {} in setup fees in {}",
                    fee, settings.location
                );
                warn!("You can check with list-products for any fees");
                warn!(
                    "Kill this process now if you want to quit. Waiting {}s before continuing...",
                    SETUP_FEE_GRACE.as_secs()
                );
                tokio::time::sleep(SETUP_FEE_GRACE).await;
            }
        }
    }

    let mut payload =
        transaction::OrderPayload::new(product_id, Some(settings.location.clone()));
    payload.ipv4_addon = ipv4_addon;
    payload.test = noop;

    let tx = transaction::place_order(client, payload, TransactionEndpoint::Standard).await?;
    finish_purchase(settings, client, tx).await
}

/// Buy a marketplace listing, wait for the transaction, then bootstrap it
pub async fn market_command(
    settings: &Settings,
    client: &RobotClient,
    listing_id: &str,
    ipv4_addon: bool,
    noop: bool,
) -> Result<()> {
    let mut payload = transaction::OrderPayload::new(listing_id, None);
    payload.ipv4_addon = ipv4_addon;
    payload.test = noop;

    let tx = transaction::place_order(client, payload, TransactionEndpoint::Market).await?;
    finish_purchase(settings, client, tx).await
}

/// Shared post-purchase flow: track the transaction to a terminal state,
/// resolve and rename the server, then bootstrap with the generated
/// one-time password.
async fn finish_purchase(
    settings: &Settings,
    client: &RobotClient,
    mut tx: crate::api::Transaction,
) -> Result<()> {
    let tracker = TransactionTracker::new();
    let status = tracker.wait_for_terminal(client, &mut tx).await?;

    // The tracker reports terminal states without raising; branch here.
    match status {
        TransactionStatus::Ready => {}
        TransactionStatus::Cancelled => {
            return Err(crate::error::ProvisionError::TransactionCancelled(tx.id));
        }
        other => {
            return Err(crate::error::ProvisionError::api(format!(
                "transaction {} ended in unexpected status {}",
                tx.id, other
            )));
        }
    }

    let directory = ServerDirectory::new(client);
    let number = tx.server_number.ok_or_else(|| {
        crate::error::ProvisionError::api(format!(
            "ready transaction {} carries no server number",
            tx.id
        ))
    })?;
    let mut server = directory.by_number(number).await?;
    directory.rename(&mut server, &settings.hostname).await?;

    // The rescue system may still be booting; like the later readiness
    // waits, a timeout here is logged and the bootstrap proceeds anyway.
    let probe = PortProbe::new();
    probe
        .wait(&server.ip, SSH_PORT, RESCUE_SYSTEM_PATIENCE, PROBE_INTERVAL)
        .await;

    let orchestrator = BootstrapOrchestrator::new(settings, Some(&directory));
    let options = BootstrapOptions {
        rescue_password: Some(tx.payload.password.clone()),
        installer_config: None,
    };
    let report = orchestrator.run(&server, &options).await?;
    info!("Bootstrap finished in phase {}", report.phase);
    Ok(())
}

/// Provision an existing server by IP
pub async fn provision_command(
    settings: &Settings,
    client: Option<&RobotClient>,
    ip: &str,
    ssh_pass: Option<String>,
    installer_config: Option<String>,
) -> Result<()> {
    info!("Provisioning {}", ip);

    let directory = client.map(ServerDirectory::new);

    let (server, options) = match &directory {
        Some(directory) => {
            let server = directory.by_ip(ip).await?;
            let options = BootstrapOptions {
                rescue_password: ssh_pass,
                installer_config: None,
            };
            (server, options)
        }
        None => {
            // Direct mode skips provider resolution entirely; the installer
            // config cannot be rendered, so it must be supplied.
            let config_path = installer_config.ok_or_else(|| {
                crate::error::ProvisionError::config(
                    "--direct needs --installer-config; create one first",
                )
            })?;
            let config_path = PathBuf::from(shellexpand::tilde(&config_path).into_owned());
            if !config_path.exists() {
                return Err(crate::error::ProvisionError::config(format!(
                    "installer config {} does not exist",
                    config_path.display()
                )));
            }
            let options = BootstrapOptions {
                rescue_password: ssh_pass,
                installer_config: Some(config_path),
            };
            (Server::from_ip(ip), options)
        }
    };

    let probe = PortProbe::new();
    probe
        .wait(&server.ip, SSH_PORT, RESCUE_SYSTEM_PATIENCE, PROBE_INTERVAL)
        .await;

    let orchestrator = BootstrapOrchestrator::new(settings, directory.as_ref());
    let report = orchestrator.run(&server, &options).await?;
    info!("Bootstrap finished in phase {}", report.phase);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{FileConfig, FileSection};
    use crate::config::SettingsOverrides;

    fn settings() -> Settings {
        let file = FileConfig {
            default: Some(FileSection {
                ssh_user: Some("admin".to_string()),
                authorized_keys: Some("keys.pub".to_string()),
                ..FileSection::default()
            }),
            provider: None,
        };
        Settings::resolve(&file, &SettingsOverrides::default(), false).unwrap()
    }

    #[tokio::test]
    async fn test_direct_provision_requires_installer_config() {
        let result =
            provision_command(&settings(), None, "203.0.113.5", None, None).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("--installer-config"));
    }

    #[tokio::test]
    async fn test_direct_provision_rejects_missing_config_file() {
        let result = provision_command(
            &settings(),
            None,
            "203.0.113.5",
            Some("hunter2".to_string()),
            Some("/nonexistent/install.txt".to_string()),
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
