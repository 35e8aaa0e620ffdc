//! Economy facade for the Coffer ledger.
//!
//! This is the surface the command and service layers talk to. It wraps the
//! stores of `coffer-db` behind an [`Economy`] value that is built once at
//! startup and handed around explicitly.
//!
//! # Architecture
//!
//! - [`config`] -- [`EconomyConfig`]: `coffer-config.yaml` loading with defaults.
//! - [`economy`] -- The [`Economy`] facade and the [`PlayerAccount`] /
//!   [`NonPlayerAccount`] handles.
//! - [`transaction`] -- [`EconomyTransaction`]: validated deposit, withdrawal,
//!   and set operations.
//!
//! # Usage
//!
//! ```no_run
//! use coffer_economy::{Economy, EconomyConfig, EconomyTransaction};
//! use coffer_types::{Currency, PlayerId};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> Result<(), coffer_economy::EconomyError> {
//! let economy = Economy::open(&EconomyConfig::default()).await?;
//! economy.registry().register(Currency::new("gold", "G", 2).primary()).await?;
//!
//! let player = economy.player(PlayerId::new());
//! let tx = EconomyTransaction::deposit("gold", Decimal::new(1000, 2))?;
//! let balance = player.transact(&tx).await?;
//! assert_eq!(balance, Decimal::new(1000, 2));
//! # Ok(())
//! # }
//! ```
//!
//! Every operation returns a [`Result`]; nothing in this crate panics.

pub mod config;
pub mod economy;
pub mod transaction;

// Re-export primary types at crate root.
pub use config::{ConfigError, EconomyConfig};
pub use economy::{Economy, NonPlayerAccount, PlayerAccount};
pub use transaction::{BalanceEffect, EconomyTransaction, EconomyTransactionBuilder, Initiator};

use coffer_db::DbError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by the economy facade.
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    /// The store failed or rejected the operation.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The transaction names a currency that is not registered.
    #[error("currency not found: {0}")]
    CurrencyNotFound(String),

    /// The transaction failed validation.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EconomyError {
    /// Whether the error refers to a missing currency or account.
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::CurrencyNotFound(_) => true,
            Self::Db(db) => db.is_not_found(),
            Self::InvalidTransaction(_) | Self::Config(_) => false,
        }
    }
}
