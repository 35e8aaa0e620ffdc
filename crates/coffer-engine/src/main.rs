//! Coffer engine binary.
//!
//! Opens the economy ledger the way the host server does at boot and
//! reports what it found. Useful for provisioning a database file ahead of
//! time and for checking a configuration before deploying it.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `coffer-config.yaml` (or the path given as the
//!    first argument)
//! 3. Open the database and apply the schema; a failure here aborts
//! 4. Load the currency catalog and register configured currencies
//! 5. Log the catalog and account counts
//! 6. Close the pool

mod error;

use std::path::{Path, PathBuf};

use coffer_economy::{Economy, EconomyConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "coffer-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or opening the ledger fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("coffer-engine starting");

    // 2. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)?;
    info!(
        database = %config.database.path.display(),
        max_connections = config.database.max_connections,
        configured_currencies = config.currencies.len(),
        "Configuration loaded"
    );

    // 3-4. Open the ledger.
    let economy = Economy::open(&config).await.map_err(EngineError::from)?;

    // 5. Report.
    report(&economy).await?;

    // 6. Shut down.
    economy.close().await;
    info!("coffer-engine stopped");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults if it is absent.
fn load_config(path: &Path) -> Result<EconomyConfig, EngineError> {
    if path.exists() {
        let config = EconomyConfig::from_file(path)?;
        Ok(config)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(EconomyConfig::parse("")?)
    }
}

/// Log every registered currency and the number of accounts.
async fn report(economy: &Economy) -> Result<(), EngineError> {
    for currency in economy.registry().list().await {
        info!(
            identifier = %currency.identifier,
            symbol = %currency.symbol,
            precision = currency.precision,
            starting_balance = %currency.format(currency.starting_balance),
            is_primary = currency.is_primary,
            "Currency"
        );
    }

    let players = economy.player_ids().await?.len();
    let accounts = economy.non_player_ids().await?.len();
    info!(players, accounts, "Ledger summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_uses_defaults() {
        let config = load_config(Path::new("does-not-exist/coffer-config.yaml"));
        assert!(config.is_ok());
        if let Ok(c) = config {
            assert!(c.currencies.is_empty());
            assert_eq!(c.database.max_connections, 8);
        }
    }
}
