//! Emporium CLI - Database migrations, seeding and supplier sync.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront and session store migrations
//! emporium migrate
//!
//! # Make an existing account an administrator
//! emporium admin grant --email admin@example.com
//!
//! # Load the built-in sample catalog (or your own YAML file)
//! emporium seed
//! emporium seed --file catalog.yaml
//!
//! # Import a single product page
//! emporium scrape https://shop.example.com/products/blue-mug
//!
//! # Sync a supplier catalog
//! emporium sync rakuten --keyword "camping stove" --max-pages 3
//! emporium sync wholesale2b --max-pages 5
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `RAKUTEN_CLIENT_ID`, `RAKUTEN_CLIENT_SECRET`, `RAKUTEN_ACCOUNT_ID` - Rakuten sync
//! - `WHOLESALE2B_API_KEY`, `WHOLESALE2B_BASE_URL` - Wholesale2b sync
//! - `SYNC_MAX_ATTEMPTS` - Attempts per supplier call (default 3)

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage administrators
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load a sample catalog into the database
    Seed {
        /// YAML catalog file; the built-in catalog is used when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Scrape one product page and import it
    Scrape {
        /// Product page URL
        url: String,
    },
    /// Sync a supplier catalog
    Sync {
        #[command(subcommand)]
        supplier: SyncSupplier,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account admin rights
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Take admin rights away from an account
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SyncSupplier {
    /// Rakuten Advertising product search
    Rakuten {
        /// Search keyword
        #[arg(short, long)]
        keyword: String,

        /// Result pages to fetch (100 products each)
        #[arg(long, default_value_t = 1)]
        max_pages: u32,
    },
    /// Wholesale2b product feed
    Wholesale2b {
        /// Feed pages to fetch
        #[arg(long, default_value_t = 1)]
        max_pages: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => commands::admin::set_admin(&email, true).await?,
            AdminAction::Revoke { email } => commands::admin::set_admin(&email, false).await?,
        },
        Commands::Seed { file } => commands::seed::run(file.as_deref()).await?,
        Commands::Scrape { url } => commands::sync::scrape(&url).await?,
        Commands::Sync { supplier } => match supplier {
            SyncSupplier::Rakuten { keyword, max_pages } => {
                commands::sync::rakuten(&keyword, max_pages).await?;
            }
            SyncSupplier::Wholesale2b { max_pages } => {
                commands::sync::wholesale2b(max_pages).await?;
            }
        },
    }
    Ok(())
}
