//! Load a `;`-delimited vendor reference file into the store.
//!
//! Usage: import_vendors supportive_data/vendor_data_de.csv

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use vendor_match::config::ConnectorConfig;
use vendor_match::import::import_vendor_file;
use vendor_match::store::executor::{PgBackend, ResilientExecutor};

#[derive(Parser, Debug)]
#[command(
    name = "import_vendors",
    about = "Import active vendors from a delimited reference file"
)]
struct Args {
    /// Path to the `;`-delimited vendor data file.
    file: PathBuf,

    /// Connection string for the reference data store.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vendor_match=info".into()),
        )
        .init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let database_url = args
        .database_url
        .unwrap_or_else(|| ConnectorConfig::from_env().database_url);

    let executor = ResilientExecutor::new(PgBackend::from_url(&database_url)?);
    let imported = import_vendor_file(&executor, &args.file).await?;
    info!(imported, file = %args.file.display(), "vendor data import complete");
    Ok(())
}
