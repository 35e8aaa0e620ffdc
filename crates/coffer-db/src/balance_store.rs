//! Balance persistence for player and non-player accounts.
//!
//! Players and non-player accounts live in separate tables with the same
//! shape. Each table is described by a [`BalanceTable`] holding its SQL, and
//! an [`AccountId`] picks the table and binds its key, so every operation
//! below is written once.
//!
//! Every read-modify-write runs inside a `BEGIN IMMEDIATE` transaction. The
//! write lock is held from before the prior value is read until the commit,
//! so concurrent `change_balance` calls on the same key never lose an update.

use std::collections::BTreeSet;

use coffer_types::{AccountId, Currency, PlayerId};
use rust_decimal::Decimal;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};

use crate::codec;
use crate::error::DbError;
use crate::sqlite::ImmediateTransaction;

/// SQL for one balance table.
struct BalanceTable {
    select_by_identifier: &'static str,
    select: &'static str,
    upsert: &'static str,
    insert_if_absent: &'static str,
    delete_account: &'static str,
    currencies_of: &'static str,
    exists: &'static str,
    list_ids: &'static str,
    /// Extra statement run after `delete_account`, keyed by the account.
    permission_cleanup: Option<&'static str>,
}

macro_rules! balance_table {
    ($table:literal, $key:literal, $cleanup:expr) => {
        BalanceTable {
            select_by_identifier: concat!(
                "SELECT b.balance FROM ", $table, " b JOIN currencies c ON c.id = b.currency_id ",
                "WHERE c.string_id = ?1 AND b.", $key, " = ?2"
            ),
            select: concat!(
                "SELECT balance FROM ", $table, " WHERE currency_id = ?1 AND ", $key, " = ?2"
            ),
            upsert: concat!(
                "INSERT INTO ", $table, " (currency_id, ", $key, ", balance) VALUES (?1, ?2, ?3) ",
                "ON CONFLICT (currency_id, ", $key, ") DO UPDATE SET balance = excluded.balance"
            ),
            insert_if_absent: concat!(
                "INSERT INTO ", $table, " (currency_id, ", $key, ", balance) VALUES (?1, ?2, ?3) ",
                "ON CONFLICT (currency_id, ", $key, ") DO NOTHING"
            ),
            delete_account: concat!("DELETE FROM ", $table, " WHERE ", $key, " = ?1"),
            currencies_of: concat!(
                "SELECT c.string_id FROM ", $table, " b JOIN currencies c ON c.id = b.currency_id ",
                "WHERE b.", $key, " = ?1 ORDER BY c.string_id"
            ),
            exists: concat!("SELECT EXISTS (SELECT 1 FROM ", $table, " WHERE ", $key, " = ?1)"),
            list_ids: concat!("SELECT DISTINCT ", $key, " FROM ", $table, " ORDER BY ", $key),
            permission_cleanup: $cleanup,
        }
    };
}

const PLAYER_BALANCES: BalanceTable = balance_table!("player_balances", "player_uuid", None);

// The delete trigger only fires per removed row, so an account holding
// permissions but no balance rows is cleaned here.
const ACCOUNT_BALANCES: BalanceTable = balance_table!(
    "account_balances",
    "account_id",
    Some(
        "DELETE FROM account_permissions WHERE account_id = ?1 \
         AND NOT EXISTS (SELECT 1 FROM account_balances WHERE account_id = ?1)"
    )
);

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Storage key of an account.
enum AccountKey<'a> {
    Player([u8; coffer_types::ids::PLAYER_ID_LEN]),
    NonPlayer(&'a str),
}

impl<'a> AccountKey<'a> {
    fn of(account: &'a AccountId) -> Self {
        match account {
            AccountId::Player(id) => Self::Player(id.to_bytes()),
            AccountId::NonPlayer(id) => Self::NonPlayer(id),
        }
    }

    const fn table(&self) -> &'static BalanceTable {
        match self {
            Self::Player(_) => &PLAYER_BALANCES,
            Self::NonPlayer(_) => &ACCOUNT_BALANCES,
        }
    }

    fn bind<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            Self::Player(bytes) => query.bind(bytes.as_slice()),
            Self::NonPlayer(id) => query.bind(*id),
        }
    }
}

/// Operations on the `player_balances` and `account_balances` tables.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    pool: SqlitePool,
}

impl BalanceLedger {
    /// Create a ledger bound to a connection pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the balance of `account` in `currency`.
    ///
    /// The first read of a pair materializes the currency's starting balance
    /// for the account and persists it; later reads return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the currency is not persisted,
    /// [`DbError::Encoding`] for malformed stored bytes, or
    /// [`DbError::Storage`] on database failure.
    pub async fn balance(&self, account: &AccountId, currency: &Currency) -> Result<Decimal, DbError> {
        let key = AccountKey::of(account);
        let table = key.table();

        let query = sqlx::query(table.select_by_identifier).bind(currency.identifier.as_str());
        let row = key.bind(query).fetch_optional(&self.pool).await?;
        if let Some(row) = row {
            return decode_row(&row, currency);
        }

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let currency_id = currency_id(tx.conn(), &currency.identifier).await?;

        // Another writer may have materialized the row since the first read.
        if let Some(existing) = select_balance(tx.conn(), &key, currency_id, currency).await? {
            tx.commit().await?;
            return Ok(existing);
        }

        let starting = currency.starting_balance_for(account);
        let encoded = codec::encode(starting, currency.precision)?;
        key.bind(sqlx::query(table.insert_if_absent).bind(currency_id))
            .bind(encoded)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;

        tracing::debug!(
            account = %account,
            currency = %currency.identifier,
            balance = %starting,
            "Materialized starting balance"
        );
        Ok(starting)
    }

    /// Overwrite the balance of `account` in `currency`.
    ///
    /// Returns the stored amount, truncated toward zero to the currency's
    /// precision.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the currency is not persisted,
    /// [`DbError::Encoding`] if the amount does not fit, or
    /// [`DbError::Storage`] on database failure.
    pub async fn set_balance(
        &self,
        account: &AccountId,
        currency: &Currency,
        amount: Decimal,
    ) -> Result<Decimal, DbError> {
        let key = AccountKey::of(account);
        let stored = currency.truncate(amount);
        let encoded = codec::encode(stored, currency.precision)?;

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let currency_id = currency_id(tx.conn(), &currency.identifier).await?;
        key.bind(sqlx::query(key.table().upsert).bind(currency_id))
            .bind(encoded)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;

        tracing::debug!(
            account = %account,
            currency = %currency.identifier,
            balance = %stored,
            "Set balance"
        );
        Ok(stored)
    }

    /// Atomically add `delta` to the balance of `account` in `currency`.
    ///
    /// A missing row counts as zero. No floor is enforced, so the result may
    /// be negative. Returns the stored new balance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the currency is not persisted,
    /// [`DbError::Encoding`] if the sum overflows or does not fit, or
    /// [`DbError::Storage`] on database failure.
    pub async fn change_balance(
        &self,
        account: &AccountId,
        currency: &Currency,
        delta: Decimal,
    ) -> Result<Decimal, DbError> {
        let key = AccountKey::of(account);

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let currency_id = currency_id(tx.conn(), &currency.identifier).await?;
        let current = select_balance(tx.conn(), &key, currency_id, currency)
            .await?
            .unwrap_or(Decimal::ZERO);

        let sum = current.checked_add(delta).ok_or_else(|| {
            DbError::Encoding(format!("balance {current} + {delta} overflows"))
        })?;
        let updated = currency.truncate(sum);
        let encoded = codec::encode(updated, currency.precision)?;

        key.bind(sqlx::query(key.table().upsert).bind(currency_id))
            .bind(encoded)
            .execute(tx.conn())
            .await?;
        tx.commit().await?;

        tracing::debug!(
            account = %account,
            currency = %currency.identifier,
            delta = %delta,
            balance = %updated,
            "Changed balance"
        );
        Ok(updated)
    }

    /// Remove every balance row of `account`, then its permissions.
    ///
    /// Returns whether any balance row existed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn delete_account(&self, account: &AccountId) -> Result<bool, DbError> {
        let key = AccountKey::of(account);
        let table = key.table();

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let deleted = key
            .bind(sqlx::query(table.delete_account))
            .execute(tx.conn())
            .await?
            .rows_affected();
        if let Some(cleanup) = table.permission_cleanup {
            key.bind(sqlx::query(cleanup)).execute(tx.conn()).await?;
        }
        tx.commit().await?;

        tracing::debug!(account = %account, rows = deleted, "Deleted account");
        Ok(deleted > 0)
    }

    /// Identifiers of every currency in which `account` has a balance row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn currencies_of(&self, account: &AccountId) -> Result<BTreeSet<String>, DbError> {
        let key = AccountKey::of(account);
        let rows = key
            .bind(sqlx::query(key.table().currencies_of))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    /// Whether `account` has at least one balance row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn has_account(&self, account: &AccountId) -> Result<bool, DbError> {
        let key = AccountKey::of(account);
        let row = key
            .bind(sqlx::query(key.table().exists))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)? != 0)
    }

    /// Every player holding at least one balance row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encoding`] for a malformed stored id, or
    /// [`DbError::Storage`] on database failure.
    pub async fn player_ids(&self) -> Result<Vec<PlayerId>, DbError> {
        let ids: Vec<Vec<u8>> = sqlx::query_scalar(PLAYER_BALANCES.list_ids)
            .fetch_all(&self.pool)
            .await?;

        ids.iter()
            .map(|bytes| codec::decode_player_id(bytes.as_slice()))
            .collect()
    }

    /// Every non-player account holding at least one balance row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn non_player_ids(&self) -> Result<Vec<String>, DbError> {
        let ids = sqlx::query_scalar(ACCOUNT_BALANCES.list_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

/// Surrogate key of a persisted currency.
async fn currency_id(conn: &mut SqliteConnection, identifier: &str) -> Result<i64, DbError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM currencies WHERE string_id = ?1")
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    id.ok_or_else(|| DbError::currency_not_found(identifier))
}

async fn select_balance(
    conn: &mut SqliteConnection,
    key: &AccountKey<'_>,
    currency_id: i64,
    currency: &Currency,
) -> Result<Option<Decimal>, DbError> {
    let row = key
        .bind(sqlx::query(key.table().select).bind(currency_id))
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|row| decode_row(&row, currency)).transpose()
}

fn decode_row(row: &SqliteRow, currency: &Currency) -> Result<Decimal, DbError> {
    let bytes: Vec<u8> = row.try_get("balance")?;
    codec::decode(&bytes, currency.precision)
}
