//! Shared type definitions for the Coffer economy ledger.
//!
//! This crate is the single source of truth for the domain types used across
//! the Coffer workspace. It performs no I/O; persistence lives in
//! `coffer-db` and the caller-facing API in `coffer-economy`.
//!
//! # Modules
//!
//! - [`ids`] -- Player and account identifiers
//! - [`enums`] -- Permission and transaction kinds
//! - [`currency`] -- The [`Currency`] definition with display formatting and parsing

pub mod currency;
pub mod enums;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use currency::{Currency, ParseAmountError};
pub use enums::{PermissionKind, TransactionKind};
pub use ids::{AccountId, PlayerId};
