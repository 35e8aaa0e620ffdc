//! Configuration loading and typed config structures for Coffer.
//!
//! The configuration lives in `coffer-config.yaml` next to the server. Every
//! field is defaulted, so an empty file (or no file at all) yields a working
//! economy backed by `coffer.db` in the working directory.
//!
//! ```yaml
//! database:
//!   path: "plugins/coffer/coffer.db"
//!   max_connections: 8
//!   busy_timeout_ms: 30000
//!
//! placeholder:
//!   identifier: "placeholder"
//!   symbol: "¤"
//!
//! currencies:
//!   - identifier: "gold"
//!     symbol: "G"
//!     name_singular: "Gold coin"
//!     name_plural: "Gold coins"
//!     precision: 2
//!     grouping_separator: ","
//!     starting_balance: "100"
//!     is_primary: true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use coffer_db::{PLACEHOLDER_IDENTIFIER, SqliteConfig};
use coffer_types::Currency;
use serde::Deserialize;

/// Environment variable that replaces `database.path`.
pub const DATABASE_PATH_ENV: &str = "COFFER_DATABASE_PATH";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The file parsed but a value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level economy configuration.
///
/// Mirrors the structure of `coffer-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Database file and pool settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// The currency created when the catalog is empty.
    #[serde(default)]
    pub placeholder: PlaceholderConfig,

    /// Currencies registered at startup if not yet present.
    #[serde(default)]
    pub currencies: Vec<Currency>,
}

impl EconomyConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `COFFER_DATABASE_PATH` overrides `database.path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.database.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_owned(),
            ));
        }
        if self.placeholder.identifier.is_empty() {
            return Err(ConfigError::Invalid(
                "placeholder.identifier must not be empty".to_owned(),
            ));
        }
        if let Some(conflict) = self.placeholder.to_currency().separator_conflict() {
            return Err(ConfigError::Invalid(format!("placeholder: {conflict}")));
        }

        let primaries = self.currencies.iter().filter(|c| c.is_primary).count();
        if primaries > 1 {
            return Err(ConfigError::Invalid(format!(
                "at most one configured currency may be primary, found {primaries}"
            )));
        }
        for (i, currency) in self.currencies.iter().enumerate() {
            if currency.identifier.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "currencies[{i}].identifier must not be empty"
                )));
            }
            if let Some(conflict) = currency.separator_conflict() {
                return Err(ConfigError::Invalid(format!("currencies[{i}]: {conflict}")));
            }
            let duplicate = self
                .currencies
                .iter()
                .skip(i.saturating_add(1))
                .any(|other| other.identifier == currency.identifier);
            if duplicate {
                return Err(ConfigError::Invalid(format!(
                    "currency {} is configured twice",
                    currency.identifier
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Database file and connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the database lock, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Create the database file if it does not exist.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

impl DatabaseConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.path = PathBuf::from(path);
        }
    }

    /// Connection settings for [`coffer_db::SqliteDb`].
    pub fn to_sqlite_config(&self) -> SqliteConfig {
        SqliteConfig::new(self.path.clone())
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_create_if_missing(self.create_if_missing)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            create_if_missing: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Placeholder currency
// ---------------------------------------------------------------------------

/// The currency registered as primary when the catalog is empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceholderConfig {
    /// Registry identifier.
    #[serde(default = "default_placeholder_identifier")]
    pub identifier: String,

    /// Display symbol.
    #[serde(default = "default_placeholder_symbol")]
    pub symbol: String,

    /// Singular display name.
    #[serde(default = "default_placeholder_singular")]
    pub name_singular: String,

    /// Plural display name.
    #[serde(default = "default_placeholder_plural")]
    pub name_plural: String,

    /// Digits after the decimal separator.
    #[serde(default = "default_placeholder_precision")]
    pub precision: u32,
}

impl PlaceholderConfig {
    /// Build the placeholder [`Currency`], flagged primary.
    pub fn to_currency(&self) -> Currency {
        Currency::new(self.identifier.as_str(), self.symbol.as_str(), self.precision)
            .with_names(self.name_singular.as_str(), self.name_plural.as_str())
            .primary()
    }
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            identifier: default_placeholder_identifier(),
            symbol: default_placeholder_symbol(),
            name_singular: default_placeholder_singular(),
            name_plural: default_placeholder_plural(),
            precision: default_placeholder_precision(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_database_path() -> PathBuf {
    PathBuf::from("coffer.db")
}

const fn default_max_connections() -> u32 {
    8
}

const fn default_busy_timeout_ms() -> u64 {
    30_000
}

const fn default_true() -> bool {
    true
}

fn default_placeholder_identifier() -> String {
    PLACEHOLDER_IDENTIFIER.to_owned()
}

fn default_placeholder_symbol() -> String {
    "¤".to_owned()
}

fn default_placeholder_singular() -> String {
    "credit".to_owned()
}

fn default_placeholder_plural() -> String {
    "credits".to_owned()
}

const fn default_placeholder_precision() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn default_config_is_valid() {
        let config = EconomyConfig::default();
        assert_eq!(config.database.path, PathBuf::from("coffer.db"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.database.busy_timeout_ms, 30_000);
        assert!(config.database.create_if_missing);
        assert_eq!(config.placeholder.identifier, PLACEHOLDER_IDENTIFIER);
        assert!(config.currencies.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = EconomyConfig::parse("");
        assert!(config.is_ok());
        if let Ok(c) = config {
            assert_eq!(c.database.max_connections, 8);
            assert_eq!(c.placeholder, PlaceholderConfig::default());
        }
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
database:
  path: "data/economy.db"
  max_connections: 4
  busy_timeout_ms: 5000
  create_if_missing: false

placeholder:
  identifier: "tokens"
  symbol: "T"
  name_singular: "token"
  name_plural: "tokens"
  precision: 0

currencies:
  - identifier: "gold"
    symbol: "G"
    name_singular: "Gold coin"
    name_plural: "Gold coins"
    precision: 2
    grouping_separator: ","
    starting_balance: "100"
    is_primary: true
  - identifier: "euro"
    symbol: "€"
    name_singular: "Euro"
    name_plural: "Euros"
    precision: 2
    decimal_separator: ","
"#;
        let config = EconomyConfig::parse(yaml);
        assert!(config.is_ok(), "{config:?}");
        let Ok(config) = config else { return };

        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(!config.database.create_if_missing);
        assert_eq!(config.placeholder.identifier, "tokens");
        assert_eq!(config.placeholder.precision, 0);

        assert_eq!(config.currencies.len(), 2);
        let gold = config.currencies.first();
        assert_eq!(gold.map(|c| c.starting_balance), Some(Decimal::new(100, 0)));
        assert_eq!(gold.and_then(|c| c.grouping_separator), Some(','));
        assert_eq!(gold.map(|c| c.is_primary), Some(true));
        let euro = config.currencies.get(1);
        assert_eq!(euro.map(|c| c.decimal_separator), Some(','));
        assert_eq!(euro.map(|c| c.is_primary), Some(false));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = EconomyConfig::parse("database:\n  max_connections: 2\n");
        assert!(config.is_ok());
        if let Ok(c) = config {
            assert_eq!(c.database.max_connections, 2);
            assert_eq!(c.database.busy_timeout_ms, 30_000);
        }
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let result = EconomyConfig::parse("database: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn zero_connections_is_rejected() {
        let result = EconomyConfig::parse("database:\n  max_connections: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn two_configured_primaries_are_rejected() {
        let config = EconomyConfig {
            currencies: vec![
                Currency::new("gold", "G", 2).primary(),
                Currency::new("silver", "S", 2).primary(),
            ],
            ..EconomyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_currencies_are_rejected() {
        let config = EconomyConfig {
            currencies: vec![Currency::new("gold", "G", 2), Currency::new("gold", "g", 0)],
            ..EconomyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn clashing_separators_are_rejected() {
        let config = EconomyConfig {
            currencies: vec![Currency::new("odd", "O", 2).with_grouping_separator('.')],
            ..EconomyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let yaml = r#"
currencies:
  - identifier: "gold"
    symbol: "G"
    name_singular: "Gold"
    name_plural: "Gold"
    precision: 2
    decimal_separator: "1"
"#;
        assert!(matches!(EconomyConfig::parse(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn database_path_override() {
        let mut database = DatabaseConfig::default();
        database.apply_overrides(|key| {
            (key == DATABASE_PATH_ENV).then(|| "/srv/coffer/override.db".to_owned())
        });
        assert_eq!(database.path, PathBuf::from("/srv/coffer/override.db"));

        // An empty value is ignored.
        database.apply_overrides(|_| Some(String::new()));
        assert_eq!(database.path, PathBuf::from("/srv/coffer/override.db"));
    }

    #[test]
    fn sqlite_config_carries_settings() {
        let database = DatabaseConfig {
            path: PathBuf::from("x.db"),
            max_connections: 3,
            busy_timeout_ms: 1500,
            create_if_missing: false,
        };
        let sqlite = database.to_sqlite_config();
        assert_eq!(sqlite.path, PathBuf::from("x.db"));
        assert_eq!(sqlite.max_connections, 3);
        assert_eq!(sqlite.busy_timeout, Duration::from_millis(1500));
        assert!(!sqlite.create_if_missing);
    }

    #[test]
    fn placeholder_currency_is_primary() {
        let currency = PlaceholderConfig::default().to_currency();
        assert!(currency.is_primary);
        assert_eq!(currency.identifier, PLACEHOLDER_IDENTIFIER);
        assert_eq!(currency.precision, 2);
    }
}
