use clap::Parser;
use sea_orm::Database;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fixeau_export::config::Config;
use fixeau_export::export::{self, ExportOptions};
use fixeau_export::fixeau::FixeauClient;
use fixeau_export::local;

#[derive(Parser, Debug)]
#[command(name = "export2fixeau")]
#[command(about = "Export EC measurements to fixeau.com")]
#[command(version)]
struct Args {
    /// API url (overrides FIXEAU_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Folder id for data sources and time series (overrides FIXEAU_FOLDER)
    #[arg(short, long)]
    folder: Option<i64>,

    /// Create a user for every observer
    #[arg(long)]
    with_users: bool,

    /// Create a data source for every device
    #[arg(long)]
    with_sources: bool,

    /// Skip photo uploads
    #[arg(long)]
    no_photos: bool,

    /// Move existing sources and series into the folder after exporting
    #[arg(long)]
    relocate: bool,

    /// Write usernames and passwords of created users to this CSV file
    #[arg(long, value_name = "FILE")]
    users_report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fixeau_export=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration (fail-fast)
    let mut config = Config::from_env()?;
    if let Some(url) = args.url {
        config.api_url = url;
    }
    if let Some(folder) = args.folder {
        config.folder = folder;
    }

    let db = Database::connect(&config.database_url).await?;
    let snapshot = local::load_snapshot(&db).await?;

    tracing::info!(url = %config.base_url(), "Logging in");
    let client = FixeauClient::login(&config).await?;

    let options = ExportOptions {
        with_users: args.with_users,
        with_sources: args.with_sources,
        with_photos: !args.no_photos,
        ..ExportOptions::from_config(&config)
    };

    let report = export::execute(
        &client,
        &snapshot,
        &options,
        args.relocate.then_some(config.folder),
        args.users_report.as_deref(),
    )
    .await?;

    report.log_summary();

    match report.aborted {
        Some(reason) => Err(format!("Export aborted: {reason}").into()),
        None => Ok(()),
    }
}
