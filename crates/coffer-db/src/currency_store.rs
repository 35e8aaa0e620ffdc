//! The currency registry: persisted catalog plus in-memory cache.
//!
//! The whole `currencies` table is loaded into memory at startup and every
//! lookup is served from the cache. Mutations are serialized by holding the
//! cache's write lock across the persistence step, and the cache is only
//! touched after the database commit succeeds, so the two never diverge on
//! success. A crash between commit and cache update is healed by the reload
//! at the next startup.
//!
//! # Primary currency
//!
//! At most one currency has `is_primary` set. The `currencies_primary_*`
//! triggers demote the previous primary inside the same statement that
//! flags the new one, so no commit ever shows two primaries.
//!
//! # Placeholder
//!
//! An empty catalog gets a placeholder primary currency at boot so that
//! [`CurrencyRegistry::primary`] always resolves. The first real currency
//! promoted to primary deletes the placeholder in the same transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use coffer_types::Currency;
use coffer_types::currency::MAX_PRECISION;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::codec;
use crate::error::DbError;

/// Identifier of the placeholder created for an empty catalog.
pub const PLACEHOLDER_IDENTIFIER: &str = "placeholder";

/// The default placeholder currency: two decimals, generic symbol, primary.
pub fn default_placeholder() -> Currency {
    Currency::new(PLACEHOLDER_IDENTIFIER, "¤", 2)
        .with_names("credit", "credits")
        .primary()
}

/// In-memory + persisted catalog of currencies.
///
/// Cloning is cheap; clones share the cache and the pool.
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    pool: SqlitePool,
    placeholder_id: Arc<str>,
    currencies: Arc<RwLock<BTreeMap<String, Currency>>>,
}

impl CurrencyRegistry {
    /// Load the catalog from the database.
    ///
    /// If the catalog is empty, `placeholder` is registered as the primary
    /// currency. If it is not empty but has no primary (an interrupted
    /// write from an older build), one is promoted: the placeholder if it
    /// exists, otherwise the oldest currency.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the catalog cannot be read or repaired.
    pub async fn load(pool: SqlitePool, placeholder: Currency) -> Result<Self, DbError> {
        let registry = Self {
            pool,
            placeholder_id: Arc::from(placeholder.identifier.as_str()),
            currencies: Arc::default(),
        };
        registry.reload().await?;

        let (empty, has_primary) = {
            let map = registry.currencies.read().await;
            (map.is_empty(), map.values().any(|c| c.is_primary))
        };

        if empty {
            tracing::warn!(
                identifier = %placeholder.identifier,
                "Currency catalog is empty, creating placeholder primary currency"
            );
            registry.register(placeholder.primary()).await?;
        } else if !has_primary {
            let candidate = registry.promotion_candidate().await?;
            tracing::warn!(identifier = %candidate, "No primary currency found, promoting");
            registry.set_primary(&candidate).await?;
        }

        Ok(registry)
    }

    /// Replace the cache with the persisted catalog.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row is malformed.
    pub async fn reload(&self) -> Result<(), DbError> {
        let mut map = self.currencies.write().await;

        let rows = sqlx::query_as::<_, CurrencyRow>(
            r"SELECT id, string_id, name_singular, name_plural, currency_symbol, decimal_symbol,
                     grouping_symbol, precision, starting_balance, is_primary
              FROM currencies
              ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut loaded = BTreeMap::new();
        for row in rows {
            let currency = Currency::try_from(row)?;
            loaded.insert(currency.identifier.clone(), currency);
        }
        *map = loaded;

        tracing::info!(count = map.len(), "Loaded currencies");
        Ok(())
    }

    /// Identifier of the boot placeholder currency.
    pub fn placeholder_identifier(&self) -> &str {
        &self.placeholder_id
    }

    /// Snapshot of all currencies, ordered by identifier.
    pub async fn list(&self) -> Vec<Currency> {
        self.currencies.read().await.values().cloned().collect()
    }

    /// Number of registered currencies.
    pub async fn len(&self) -> usize {
        self.currencies.read().await.len()
    }

    /// Whether no currency is registered.
    pub async fn is_empty(&self) -> bool {
        self.currencies.read().await.is_empty()
    }

    /// Look up a currency by identifier.
    pub async fn find(&self, identifier: &str) -> Option<Currency> {
        self.currencies.read().await.get(identifier).cloned()
    }

    /// Look up a currency that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the identifier is unknown.
    pub async fn require(&self, identifier: &str) -> Result<Currency, DbError> {
        self.find(identifier)
            .await
            .ok_or_else(|| DbError::currency_not_found(identifier))
    }

    /// The primary currency.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NoPrimary`] if no currency is flagged primary,
    /// which cannot happen after [`CurrencyRegistry::load`].
    pub async fn primary(&self) -> Result<Currency, DbError> {
        self.currencies
            .read()
            .await
            .values()
            .find(|c| c.is_primary)
            .cloned()
            .ok_or(DbError::NoPrimary)
    }

    /// Identifier of the primary currency.
    ///
    /// # Errors
    ///
    /// See [`CurrencyRegistry::primary`].
    pub async fn primary_identifier(&self) -> Result<String, DbError> {
        self.primary().await.map(|c| c.identifier)
    }

    /// Persist a new currency and add it to the cache.
    ///
    /// If `currency.is_primary` is set, the previous primary is demoted in
    /// the same statement, and the placeholder (if still present) is deleted
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if the identifier is taken,
    /// [`DbError::Encoding`] if the precision or starting balance cannot be
    /// stored, or [`DbError::Storage`] on database failure.
    pub async fn register(&self, mut currency: Currency) -> Result<Currency, DbError> {
        let mut map = self.currencies.write().await;

        if map.contains_key(&currency.identifier) {
            return Err(DbError::AlreadyExists(currency.identifier));
        }
        validate(&currency)?;
        currency.starting_balance = currency.truncate(currency.starting_balance);
        let starting_balance = codec::encode(currency.starting_balance, currency.precision)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO currencies (string_id, name_singular, name_plural, currency_symbol,
                                      decimal_symbol, grouping_symbol, precision,
                                      starting_balance, is_primary)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&currency.identifier)
        .bind(&currency.name_singular)
        .bind(&currency.name_plural)
        .bind(&currency.symbol)
        .bind(currency.decimal_separator.to_string())
        .bind(currency.grouping_separator.map(|c| c.to_string()))
        .bind(i64::from(currency.precision))
        .bind(starting_balance)
        .bind(currency.is_primary)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &currency.identifier))?;

        let placeholder_removed = if currency.is_primary {
            self.delete_placeholder(&mut tx, &currency.identifier).await?
        } else {
            false
        };

        tx.commit().await?;

        if currency.is_primary {
            for other in map.values_mut() {
                other.is_primary = false;
            }
        }
        if placeholder_removed {
            map.remove(&*self.placeholder_id);
            tracing::info!(placeholder = %self.placeholder_id, "Removed placeholder currency");
        }
        map.insert(currency.identifier.clone(), currency.clone());

        tracing::info!(
            identifier = %currency.identifier,
            precision = currency.precision,
            is_primary = currency.is_primary,
            "Registered currency"
        );
        Ok(currency)
    }

    /// Delete a currency and every balance held in it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the identifier is unknown,
    /// [`DbError::PrimaryCurrency`] if it is the primary currency, or
    /// [`DbError::Storage`] on database failure.
    pub async fn unregister(&self, identifier: &str) -> Result<Currency, DbError> {
        let mut map = self.currencies.write().await;

        let existing = map
            .get(identifier)
            .ok_or_else(|| DbError::currency_not_found(identifier))?;
        if existing.is_primary {
            return Err(DbError::PrimaryCurrency(identifier.to_owned()));
        }

        // Balance rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM currencies WHERE string_id = ?1")
            .bind(identifier)
            .execute(&self.pool)
            .await?;

        let removed = map
            .remove(identifier)
            .ok_or_else(|| DbError::currency_not_found(identifier))?;
        if result.rows_affected() == 0 {
            tracing::warn!(identifier, "Currency was cached but missing from the database");
        }

        tracing::info!(identifier, "Unregistered currency");
        Ok(removed)
    }

    /// Unregister by value. See [`CurrencyRegistry::unregister`].
    ///
    /// # Errors
    ///
    /// See [`CurrencyRegistry::unregister`].
    pub async fn unregister_currency(&self, currency: &Currency) -> Result<Currency, DbError> {
        self.unregister(&currency.identifier).await
    }

    /// Make `identifier` the primary currency, demoting the current one.
    ///
    /// Promoting a real currency also deletes the placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the identifier is unknown, or
    /// [`DbError::Storage`] on database failure.
    pub async fn set_primary(&self, identifier: &str) -> Result<Currency, DbError> {
        let mut map = self.currencies.write().await;

        if !map.contains_key(identifier) {
            return Err(DbError::currency_not_found(identifier));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE currencies SET is_primary = TRUE WHERE string_id = ?1")
            .bind(identifier)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::currency_not_found(identifier));
        }
        let placeholder_removed = self.delete_placeholder(&mut tx, identifier).await?;

        tx.commit().await?;

        for currency in map.values_mut() {
            currency.is_primary = currency.identifier == identifier;
        }
        if placeholder_removed {
            map.remove(&*self.placeholder_id);
            tracing::info!(placeholder = %self.placeholder_id, "Removed placeholder currency");
        }

        tracing::info!(identifier, "Primary currency changed");
        map.get(identifier)
            .cloned()
            .ok_or_else(|| DbError::currency_not_found(identifier))
    }

    /// Delete the placeholder unless `promoted` is the placeholder itself.
    /// Returns whether a row was removed.
    async fn delete_placeholder(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        promoted: &str,
    ) -> Result<bool, DbError> {
        if promoted == &*self.placeholder_id {
            return Ok(false);
        }
        let result = sqlx::query("DELETE FROM currencies WHERE string_id = ?1")
            .bind(&*self.placeholder_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn promotion_candidate(&self) -> Result<String, DbError> {
        if self.find(&self.placeholder_id).await.is_some() {
            return Ok(self.placeholder_id.to_string());
        }
        let oldest: Option<String> =
            sqlx::query_scalar("SELECT string_id FROM currencies ORDER BY id LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        oldest.ok_or(DbError::NoPrimary)
    }
}

fn validate(currency: &Currency) -> Result<(), DbError> {
    if currency.identifier.is_empty() {
        return Err(DbError::Config("currency identifier must not be empty".to_owned()));
    }
    if currency.precision > MAX_PRECISION {
        return Err(DbError::Encoding(format!(
            "currency {} precision {} exceeds maximum {MAX_PRECISION}",
            currency.identifier, currency.precision
        )));
    }
    if let Some(conflict) = currency.separator_conflict() {
        return Err(DbError::Config(format!(
            "currency {}: {conflict}",
            currency.identifier
        )));
    }
    Ok(())
}

fn map_insert_error(err: sqlx::Error, identifier: &str) -> DbError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return DbError::AlreadyExists(identifier.to_owned());
        }
    }
    DbError::Storage(err)
}

/// A row from the `currencies` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CurrencyRow {
    /// Surrogate key referenced by balance rows.
    pub id: i64,
    /// Unique currency identifier.
    pub string_id: String,
    /// Singular display name.
    pub name_singular: String,
    /// Plural display name.
    pub name_plural: String,
    /// Currency symbol.
    pub currency_symbol: String,
    /// Decimal separator (one character).
    pub decimal_symbol: String,
    /// Grouping separator (one character), if any.
    pub grouping_symbol: Option<String>,
    /// Digits after the decimal separator.
    pub precision: i64,
    /// Player starting balance as scaled-integer bytes.
    pub starting_balance: Vec<u8>,
    /// Primary flag.
    pub is_primary: bool,
}

impl TryFrom<CurrencyRow> for Currency {
    type Error = DbError;

    fn try_from(row: CurrencyRow) -> Result<Self, Self::Error> {
        let precision = u32::try_from(row.precision).map_err(|e| {
            DbError::Encoding(format!(
                "currency {} has invalid precision {}: {e}",
                row.string_id, row.precision
            ))
        })?;
        let decimal_separator = row.decimal_symbol.chars().next().ok_or_else(|| {
            DbError::Encoding(format!("currency {} has no decimal separator", row.string_id))
        })?;
        let grouping_separator = row.grouping_symbol.and_then(|s| s.chars().next());
        let starting_balance = codec::decode(&row.starting_balance, precision)?;

        Ok(Self {
            identifier: row.string_id,
            symbol: row.currency_symbol,
            decimal_separator,
            grouping_separator,
            name_singular: row.name_singular,
            name_plural: row.name_plural,
            precision,
            starting_balance,
            is_primary: row.is_primary,
        })
    }
}
