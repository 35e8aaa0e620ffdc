//! Embedded `SQLite` ledger for the Coffer economy.
//!
//! One database file holds the currency catalog, the balances of player and
//! non-player accounts, and the permissions players hold over non-player
//! accounts. Amounts are exact decimals stored as scaled integers.
//!
//! # Architecture
//!
//! ```text
//! SqliteDb (pool + schema)
//!     |
//!     +-- CurrencyRegistry  (in-memory catalog, persisted in `currencies`)
//!     +-- BalanceLedger     (`player_balances`, `account_balances`)
//!     +-- PermissionStore   (`account_permissions`)
//! ```
//!
//! All three stores hold a clone of the same pool and may be shared freely
//! across tasks. Mutations on one (account, currency) key are serialized by
//! `BEGIN IMMEDIATE` transactions; registry mutations are serialized by the
//! registry's own lock.
//!
//! # Modules
//!
//! - [`sqlite`] -- Connection pool, configuration, and schema migrations
//! - [`codec`] -- Fixed-point amount encoding
//! - [`currency_store`] -- The currency registry
//! - [`balance_store`] -- Balance reads and atomic updates
//! - [`permission_store`] -- Account permission grants
//! - [`error`] -- Shared error types

pub mod balance_store;
pub mod codec;
pub mod currency_store;
pub mod error;
pub mod permission_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use balance_store::BalanceLedger;
pub use currency_store::{CurrencyRegistry, CurrencyRow, PLACEHOLDER_IDENTIFIER, default_placeholder};
pub use error::DbError;
pub use permission_store::{PermissionRow, PermissionStore};
pub use sqlite::{SqliteConfig, SqliteDb};
