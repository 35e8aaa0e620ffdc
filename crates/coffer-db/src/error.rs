//! Error types for the ledger store.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the domain failures callers are expected to
//! render (unknown currency, duplicate identifier, malformed balance bytes).

/// Errors that can occur in the ledger store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A currency or account referenced by a mutation does not exist.
    #[error("{kind} not found: {identifier}")]
    NotFound {
        /// What was looked up (`"currency"`, `"account"`, ...).
        kind: &'static str,
        /// The identifier that was not found.
        identifier: String,
    },

    /// No currency is flagged primary.
    #[error("no primary currency is registered")]
    NoPrimary,

    /// A currency with this identifier is already registered.
    #[error("currency already exists: {0}")]
    AlreadyExists(String),

    /// The primary currency cannot be removed while it is primary.
    #[error("currency {0} is the primary currency; promote another first")]
    PrimaryCurrency(String),

    /// An I/O or constraint failure from `SQLite`.
    #[error("SQLite error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Applying the schema failed. Fatal at startup.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Malformed or out-of-range scaled-integer bytes, or an amount that
    /// cannot be represented at the requested precision.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub(crate) fn currency_not_found(identifier: &str) -> Self {
        Self::NotFound {
            kind: "currency",
            identifier: identifier.to_owned(),
        }
    }

    /// Whether this is a [`DbError::NotFound`] or [`DbError::NoPrimary`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoPrimary)
    }
}
