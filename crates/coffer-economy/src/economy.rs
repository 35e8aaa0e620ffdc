//! The [`Economy`] facade and its account handles.
//!
//! An [`Economy`] is built once at startup from an [`EconomyConfig`] and
//! passed to whatever needs it; there is no global instance. It is cheap to
//! clone, and every clone shares the same pool and currency cache.

use std::collections::{BTreeMap, BTreeSet};

use coffer_db::{BalanceLedger, CurrencyRegistry, PermissionStore, SqliteDb};
use coffer_types::{AccountId, Currency, PermissionKind, PlayerId};
use rust_decimal::Decimal;

use crate::EconomyError;
use crate::config::EconomyConfig;
use crate::transaction::{BalanceEffect, EconomyTransaction};

/// Entry point to the ledger.
#[derive(Debug, Clone)]
pub struct Economy {
    db: SqliteDb,
    registry: CurrencyRegistry,
    ledger: BalanceLedger,
    permissions: PermissionStore,
}

impl Economy {
    /// Open the database, apply the schema, load the currency catalog, and
    /// register any configured currency not yet present.
    ///
    /// A schema failure is returned as an error; callers must not continue
    /// without a working store.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] if the store cannot be opened, migrated,
    /// or seeded.
    pub async fn open(config: &EconomyConfig) -> Result<Self, EconomyError> {
        let db = SqliteDb::open(&config.database.to_sqlite_config()).await?;
        Self::with_db(db, config).await
    }

    /// Build the facade on an already-opened database.
    ///
    /// # Errors
    ///
    /// See [`Economy::open`].
    pub async fn with_db(db: SqliteDb, config: &EconomyConfig) -> Result<Self, EconomyError> {
        let registry =
            CurrencyRegistry::load(db.pool().clone(), config.placeholder.to_currency()).await?;

        for currency in &config.currencies {
            if registry.find(&currency.identifier).await.is_none() {
                registry.register(currency.clone()).await?;
            }
        }

        let economy = Self {
            ledger: BalanceLedger::new(db.pool().clone()),
            permissions: PermissionStore::new(db.pool().clone()),
            registry,
            db,
        };

        let currencies = economy.registry.len().await;
        let primary = economy.registry.primary_identifier().await?;
        tracing::info!(currencies, %primary, "Economy ready");
        Ok(economy)
    }

    /// The currency registry.
    pub const fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    /// The balance ledger.
    pub const fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    /// The permission store.
    pub const fn permissions(&self) -> &PermissionStore {
        &self.permissions
    }

    /// Handle to a player's account.
    pub fn player(&self, id: impl Into<PlayerId>) -> PlayerAccount {
        let id = id.into();
        PlayerAccount {
            economy: self.clone(),
            id,
            account: AccountId::Player(id),
        }
    }

    /// Handle to a non-player account.
    pub fn non_player(&self, id: impl Into<String>) -> NonPlayerAccount {
        let id = id.into();
        NonPlayerAccount {
            economy: self.clone(),
            account: AccountId::NonPlayer(id.clone()),
            id,
        }
    }

    /// Look up a registered currency.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::CurrencyNotFound`] if it is not registered.
    pub async fn currency(&self, identifier: &str) -> Result<Currency, EconomyError> {
        self.registry
            .find(identifier)
            .await
            .ok_or_else(|| EconomyError::CurrencyNotFound(identifier.to_owned()))
    }

    /// Balance of `account` in the currency named `currency`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::CurrencyNotFound`] for an unknown currency, or
    /// [`EconomyError::Db`] on storage failure.
    pub async fn balance(&self, account: &AccountId, currency: &str) -> Result<Decimal, EconomyError> {
        let currency = self.currency(currency).await?;
        Ok(self.ledger.balance(account, &currency).await?)
    }

    /// Apply `transaction` to `account` and return the resulting balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::CurrencyNotFound`] for an unknown currency, or
    /// [`EconomyError::Db`] on storage failure.
    pub async fn transact(
        &self,
        account: &AccountId,
        transaction: &EconomyTransaction,
    ) -> Result<Decimal, EconomyError> {
        let currency = self.currency(transaction.currency()).await?;

        let balance = match transaction.effect() {
            BalanceEffect::Change(delta) => {
                self.ledger.change_balance(account, &currency, delta).await?
            }
            BalanceEffect::Set(amount) => self.ledger.set_balance(account, &currency, amount).await?,
        };

        tracing::info!(
            account = %account,
            currency = %currency.identifier,
            kind = %transaction.kind(),
            amount = %transaction.amount(),
            initiator = %transaction.initiator(),
            reason = transaction.reason().unwrap_or_default(),
            balance = %balance,
            "Transaction applied"
        );
        Ok(balance)
    }

    /// Delete every balance of `account` (and, for non-player accounts, its
    /// permissions). Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn delete_account(&self, account: &AccountId) -> Result<bool, EconomyError> {
        Ok(self.ledger.delete_account(account).await?)
    }

    /// Currencies in which `account` holds a balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn held_currencies(&self, account: &AccountId) -> Result<BTreeSet<String>, EconomyError> {
        Ok(self.ledger.currencies_of(account).await?)
    }

    /// Whether `account` holds any balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn has_account(&self, account: &AccountId) -> Result<bool, EconomyError> {
        Ok(self.ledger.has_account(account).await?)
    }

    /// Every player with at least one balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn player_ids(&self) -> Result<Vec<PlayerId>, EconomyError> {
        Ok(self.ledger.player_ids().await?)
    }

    /// Every non-player account with at least one balance.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn non_player_ids(&self) -> Result<Vec<String>, EconomyError> {
        Ok(self.ledger.non_player_ids().await?)
    }

    /// Non-player accounts on which `player` holds every kind in `kinds`
    /// (any permission at all when `kinds` is empty).
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn accounts_for(
        &self,
        player: PlayerId,
        kinds: &[PermissionKind],
    ) -> Result<BTreeSet<String>, EconomyError> {
        let accounts = if kinds.is_empty() {
            self.permissions.accounts_of(player).await?
        } else {
            self.permissions.accounts_with(player, kinds).await?
        };
        Ok(accounts)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

// ---------------------------------------------------------------------------
// Account handles
// ---------------------------------------------------------------------------

/// A player's account.
#[derive(Debug, Clone)]
pub struct PlayerAccount {
    economy: Economy,
    id: PlayerId,
    account: AccountId,
}

impl PlayerAccount {
    /// The player.
    pub const fn id(&self) -> PlayerId {
        self.id
    }

    /// The ledger key.
    pub const fn account_id(&self) -> &AccountId {
        &self.account
    }

    /// Balance in `currency`, materializing the starting balance on first read.
    ///
    /// # Errors
    ///
    /// See [`Economy::balance`].
    pub async fn balance(&self, currency: &str) -> Result<Decimal, EconomyError> {
        self.economy.balance(&self.account, currency).await
    }

    /// Apply a transaction.
    ///
    /// # Errors
    ///
    /// See [`Economy::transact`].
    pub async fn transact(&self, transaction: &EconomyTransaction) -> Result<Decimal, EconomyError> {
        self.economy.transact(&self.account, transaction).await
    }

    /// Delete every balance of this player.
    ///
    /// # Errors
    ///
    /// See [`Economy::delete_account`].
    pub async fn delete(&self) -> Result<bool, EconomyError> {
        self.economy.delete_account(&self.account).await
    }

    /// Currencies in which this player holds a balance.
    ///
    /// # Errors
    ///
    /// See [`Economy::held_currencies`].
    pub async fn held_currencies(&self) -> Result<BTreeSet<String>, EconomyError> {
        self.economy.held_currencies(&self.account).await
    }
}

/// A non-player account (bank, guild, shop) with player permissions.
#[derive(Debug, Clone)]
pub struct NonPlayerAccount {
    economy: Economy,
    id: String,
    account: AccountId,
}

impl NonPlayerAccount {
    /// The account identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The ledger key.
    pub const fn account_id(&self) -> &AccountId {
        &self.account
    }

    /// Balance in `currency`. A fresh account starts at zero.
    ///
    /// # Errors
    ///
    /// See [`Economy::balance`].
    pub async fn balance(&self, currency: &str) -> Result<Decimal, EconomyError> {
        self.economy.balance(&self.account, currency).await
    }

    /// Apply a transaction.
    ///
    /// # Errors
    ///
    /// See [`Economy::transact`].
    pub async fn transact(&self, transaction: &EconomyTransaction) -> Result<Decimal, EconomyError> {
        self.economy.transact(&self.account, transaction).await
    }

    /// Delete every balance and every permission of this account.
    ///
    /// # Errors
    ///
    /// See [`Economy::delete_account`].
    pub async fn delete(&self) -> Result<bool, EconomyError> {
        self.economy.delete_account(&self.account).await
    }

    /// Currencies in which this account holds a balance.
    ///
    /// # Errors
    ///
    /// See [`Economy::held_currencies`].
    pub async fn held_currencies(&self) -> Result<BTreeSet<String>, EconomyError> {
        self.economy.held_currencies(&self.account).await
    }

    /// Players holding any permission here.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn members(&self) -> Result<BTreeSet<PlayerId>, EconomyError> {
        Ok(self.economy.permissions.members_of(&self.id).await?)
    }

    /// Whether `player` holds any permission here.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn is_member(&self, player: PlayerId) -> Result<bool, EconomyError> {
        Ok(self.economy.permissions.is_member(player, &self.id).await?)
    }

    /// Every grant here, grouped by player.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn permission_map(
        &self,
    ) -> Result<BTreeMap<PlayerId, BTreeSet<PermissionKind>>, EconomyError> {
        Ok(self.economy.permissions.permission_map(&self.id).await?)
    }

    /// Permissions `player` holds here.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn permissions(&self, player: PlayerId) -> Result<BTreeSet<PermissionKind>, EconomyError> {
        Ok(self.economy.permissions.permissions(player, &self.id).await?)
    }

    /// Whether `player` holds every kind in `kinds` here.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn has_permissions(
        &self,
        player: PlayerId,
        kinds: &[PermissionKind],
    ) -> Result<bool, EconomyError> {
        Ok(self.economy.permissions.has_all(player, &self.id, kinds).await?)
    }

    /// Grant or revoke `kinds` for `player` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Db`] on storage failure.
    pub async fn set_permissions(
        &self,
        player: PlayerId,
        kinds: &[PermissionKind],
        grant: bool,
    ) -> Result<(), EconomyError> {
        self.economy
            .permissions
            .set_permissions(player, &self.id, kinds, grant)
            .await?;
        Ok(())
    }
}
