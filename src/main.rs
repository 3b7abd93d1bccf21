// file: src/main.rs
// version: 1.0.0
// guid: d6f9a2b5-8c1e-4470-9bd6-f9a2b5c8e1f4

//! Bare-Metal Provision Agent - Main entry point

use baremetal_provision_agent::{
    api::RobotClient,
    cli::{args::Cli, args::Commands, commands::*},
    config::{ConfigLoader, Settings},
    logging::logger,
    Result,
};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger(cli.verbose, cli.quiet) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    // Single dispatcher for exit codes: every component propagates errors
    // up to here instead of exiting at its call site.
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let provider_mode = !cli.direct;

    let file = match &cli.config {
        Some(path) => ConfigLoader::load(shellexpand::tilde(path).as_ref())?,
        None => ConfigLoader::load_default()?,
    };
    let settings = Settings::resolve(&file, &cli.overrides(), provider_mode)?;

    if let Some(hook) = &settings.post_provision {
        url::Url::parse(hook).map_err(|e| {
            baremetal_provision_agent::ProvisionError::config(format!(
                "invalid post-provision URL {}: {}",
                hook, e
            ))
        })?;
    }

    let client = if provider_mode {
        let (user, password) = settings.api_credentials()?;
        Some(RobotClient::new(user, password))
    } else {
        None
    };

    match cli.command {
        Commands::ListProducts => {
            list_products_command(require_client(&client, "listing products")?).await
        }
        Commands::Order {
            product,
            location: _,
            no_ipv4,
            noop,
        } => {
            order_command(
                &settings,
                require_client(&client, "ordering servers")?,
                &product,
                !no_ipv4,
                noop,
            )
            .await
        }
        Commands::Market { listing, no_ipv4, noop } => {
            market_command(
                &settings,
                require_client(&client, "marketplace orders")?,
                &listing,
                !no_ipv4,
                noop,
            )
            .await
        }
        Commands::Provision {
            ip,
            ssh_pass,
            installer_config,
        } => provision_command(&settings, client.as_ref(), &ip, ssh_pass, installer_config).await,
    }
}

fn require_client<'a>(client: &'a Option<RobotClient>, what: &str) -> Result<&'a RobotClient> {
    client.as_ref().ok_or_else(|| {
        baremetal_provision_agent::ProvisionError::config(format!(
            "{} needs the provider API, but --direct is given",
            what
        ))
    })
}
