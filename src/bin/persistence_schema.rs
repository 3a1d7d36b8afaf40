//! persistence-schema: create or drop the persistence tables
//!
//! ## Usage
//! ```text
//! persistence-schema create
//! persistence-schema drop
//! ```
//!
//! ## Configuration
//! - PERSISTENCE_CONFIG: Path to YAML config (default: persistence.yaml)
//! - STORAGE_TYPE / STORAGE_URL / STORAGE_MAX_CONNECTIONS: Overrides
//! - PERSISTENCE_LOG: Log filter (default: info)

use tracing::{error, info};

use angzarr_persistence::config::Config;
use angzarr_persistence::storage;
use angzarr_persistence::utils::bootstrap::init_tracing;

const USAGE: &str = "usage: persistence-schema <create|drop>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let command = std::env::args().nth(1).unwrap_or_default();
    if command != "create" && command != "drop" {
        error!("{}", USAGE);
        std::process::exit(2);
    }

    let config = Config::load()?;
    let backend = storage::connect(&config.storage).await?;

    match command.as_str() {
        "create" => backend.create_schema().await?,
        _ => backend.drop_schema().await?,
    }

    info!(command = %command, storage = %config.storage.storage_type, "persistence-schema finished");
    Ok(())
}
