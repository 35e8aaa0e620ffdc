//! Permission persistence for non-player accounts.
//!
//! A grant is the tuple `(account, player, kind)`. The table's primary key
//! covers the whole tuple, so granting twice is a no-op and revoking a
//! missing grant is a no-op too. Grants are removed together with the last
//! balance row of their account (see [`crate::balance_store`]).

use std::collections::{BTreeMap, BTreeSet};

use coffer_types::{PermissionKind, PlayerId};
use sqlx::{SqliteConnection, SqlitePool};

use crate::codec::decode_player_id;
use crate::error::DbError;

/// A row from the `account_permissions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PermissionRow {
    /// The non-player account.
    pub account_id: String,
    /// The player's 16-byte id.
    pub player_uuid: Vec<u8>,
    /// The permission ordinal.
    pub permission: i64,
}

impl PermissionRow {
    fn player(&self) -> Result<PlayerId, DbError> {
        decode_player_id(&self.player_uuid)
    }

    fn kind(&self) -> Result<PermissionKind, DbError> {
        decode_kind(self.permission)
    }
}

/// Operations on the `account_permissions` table.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct PermissionStore {
    pool: SqlitePool,
}

impl PermissionStore {
    /// Create a permission store bound to a connection pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Grant (`grant = true`) or revoke one permission.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn set_permission(
        &self,
        player: PlayerId,
        account: &str,
        kind: PermissionKind,
        grant: bool,
    ) -> Result<(), DbError> {
        let mut conn = self.pool.acquire().await?;
        write_grant(&mut conn, player, account, kind, grant).await?;
        tracing::debug!(%player, account, %kind, grant, "Set permission");
        Ok(())
    }

    /// Grant or revoke several permissions in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure; nothing is applied.
    pub async fn set_permissions(
        &self,
        player: PlayerId,
        account: &str,
        kinds: &[PermissionKind],
        grant: bool,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for kind in kinds {
            write_grant(&mut *tx, player, account, *kind, grant).await?;
        }
        tx.commit().await?;

        tracing::debug!(%player, account, count = kinds.len(), grant, "Set permissions");
        Ok(())
    }

    /// The permissions `player` holds on `account`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encoding`] for an unknown stored ordinal, or
    /// [`DbError::Storage`] on database failure.
    pub async fn permissions(
        &self,
        player: PlayerId,
        account: &str,
    ) -> Result<BTreeSet<PermissionKind>, DbError> {
        let ordinals: Vec<i64> = sqlx::query_scalar(
            "SELECT permission FROM account_permissions WHERE account_id = ?1 AND player_uuid = ?2",
        )
        .bind(account)
        .bind(player.to_bytes().to_vec())
        .fetch_all(&self.pool)
        .await?;

        ordinals.into_iter().map(decode_kind).collect()
    }

    /// Whether `player` holds every kind in `kinds` on `account`.
    ///
    /// An empty `kinds` is trivially satisfied.
    ///
    /// # Errors
    ///
    /// See [`PermissionStore::permissions`].
    pub async fn has_all(
        &self,
        player: PlayerId,
        account: &str,
        kinds: &[PermissionKind],
    ) -> Result<bool, DbError> {
        let granted = self.permissions(player, account).await?;
        Ok(kinds.iter().all(|kind| granted.contains(kind)))
    }

    /// Whether `player` holds any permission on `account`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn is_member(&self, player: PlayerId, account: &str) -> Result<bool, DbError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM account_permissions WHERE account_id = ?1 AND player_uuid = ?2)",
        )
        .bind(account)
        .bind(player.to_bytes().to_vec())
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    /// Distinct players holding any permission on `account`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encoding`] for a malformed stored id, or
    /// [`DbError::Storage`] on database failure.
    pub async fn members_of(&self, account: &str) -> Result<BTreeSet<PlayerId>, DbError> {
        let ids: Vec<Vec<u8>> = sqlx::query_scalar(
            "SELECT DISTINCT player_uuid FROM account_permissions WHERE account_id = ?1",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?;

        ids.iter()
            .map(|bytes| decode_player_id(bytes.as_slice()))
            .collect()
    }

    /// Every grant on `account`, grouped by player.
    ///
    /// # Errors
    ///
    /// See [`PermissionStore::members_of`].
    pub async fn permission_map(
        &self,
        account: &str,
    ) -> Result<BTreeMap<PlayerId, BTreeSet<PermissionKind>>, DbError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT account_id, player_uuid, permission FROM account_permissions WHERE account_id = ?1",
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?;

        let mut map: BTreeMap<PlayerId, BTreeSet<PermissionKind>> = BTreeMap::new();
        for row in &rows {
            map.entry(row.player()?).or_default().insert(row.kind()?);
        }
        Ok(map)
    }

    /// Accounts on which `player` holds any permission.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Storage`] on database failure.
    pub async fn accounts_of(&self, player: PlayerId) -> Result<BTreeSet<String>, DbError> {
        let accounts: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT account_id FROM account_permissions WHERE player_uuid = ?1",
        )
        .bind(player.to_bytes().to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts.into_iter().collect())
    }

    /// Accounts on which `player` holds every kind in `kinds`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Encoding`] for an unknown stored ordinal, or
    /// [`DbError::Storage`] on database failure.
    pub async fn accounts_with(
        &self,
        player: PlayerId,
        kinds: &[PermissionKind],
    ) -> Result<BTreeSet<String>, DbError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT account_id, player_uuid, permission FROM account_permissions WHERE player_uuid = ?1",
        )
        .bind(player.to_bytes().to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut granted: BTreeMap<String, BTreeSet<PermissionKind>> = BTreeMap::new();
        for row in rows {
            let kind = row.kind()?;
            granted.entry(row.account_id).or_default().insert(kind);
        }

        Ok(granted
            .into_iter()
            .filter(|(_, held)| kinds.iter().all(|kind| held.contains(kind)))
            .map(|(account, _)| account)
            .collect())
    }
}

async fn write_grant(
    conn: &mut SqliteConnection,
    player: PlayerId,
    account: &str,
    kind: PermissionKind,
    grant: bool,
) -> Result<(), DbError> {
    let sql = if grant {
        "INSERT OR IGNORE INTO account_permissions (account_id, player_uuid, permission) VALUES (?1, ?2, ?3)"
    } else {
        "DELETE FROM account_permissions WHERE account_id = ?1 AND player_uuid = ?2 AND permission = ?3"
    };
    sqlx::query(sql)
        .bind(account)
        .bind(player.to_bytes().to_vec())
        .bind(kind.ordinal())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn decode_kind(ordinal: i64) -> Result<PermissionKind, DbError> {
    PermissionKind::from_ordinal(ordinal)
        .ok_or_else(|| DbError::Encoding(format!("unknown permission ordinal {ordinal}")))
}
