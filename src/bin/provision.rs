//! Store provisioning CLI
//!
//! Usage:
//!   provision setup
//!   provision reset
//!   provision reset-setup
//!   provision delete-attribute <collection> <attribute>
//!
//! Reads STORE_ENDPOINT, STORE_PROJECT_ID, STORE_DATABASE_ID and STORE_API_KEY.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventcity::config::ProvisionConfig;
use eventcity::provision::Provisioner;

#[derive(Parser)]
#[command(name = "provision")]
#[command(about = "Create, drop and migrate the EventCity document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and indexes
    Setup,
    /// Drop every table
    Reset,
    /// Drop every table, then create them again
    ResetSetup,
    /// Remove an attribute from every document of a collection
    #[command(alias = "deleteAttribute")]
    DeleteAttribute {
        /// Collection name, e.g. events
        collection: String,
        /// Attribute key, e.g. viewCount
        attribute: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventcity=info,provision=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match ProvisionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let provisioner = Provisioner::connect(&config).await?;

    match cli.command {
        Commands::Setup => provisioner.setup().await?,
        Commands::Reset => provisioner.reset().await?,
        Commands::ResetSetup => {
            provisioner.reset().await?;
            provisioner.setup().await?;
        }
        Commands::DeleteAttribute {
            collection,
            attribute,
        } => {
            let changed = provisioner.delete_attribute(&collection, &attribute).await?;
            println!("Removed {} from {} document(s) in {}", attribute, changed, collection);
        }
    }

    Ok(())
}
