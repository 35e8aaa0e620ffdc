//! Error types for the Coffer engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: coffer_economy::ConfigError,
    },

    /// The ledger could not be opened, migrated, or queried.
    #[error("economy error: {source}")]
    Economy {
        /// The underlying economy error.
        #[from]
        source: coffer_economy::EconomyError,
    },
}
