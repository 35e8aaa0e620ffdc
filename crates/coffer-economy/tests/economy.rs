//! End-to-end tests for the economy facade against a temporary database.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeSet;

use coffer_economy::{Economy, EconomyConfig, EconomyError, EconomyTransaction, Initiator};
use coffer_types::{Currency, PermissionKind, PlayerId, TransactionKind};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn config_in(dir: &TempDir, currencies: Vec<Currency>) -> EconomyConfig {
    let mut config = EconomyConfig {
        currencies,
        ..EconomyConfig::default()
    };
    config.database.path = dir.path().join("economy.db");
    config
}

fn gold() -> Currency {
    Currency::new("gold", "G", 2)
        .with_names("Gold coin", "Gold coins")
        .with_grouping_separator(',')
        .with_starting_balance(Decimal::new(100, 0))
        .primary()
}

async fn open_with_gold() -> (TempDir, Economy) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let economy = Economy::open(&config_in(&dir, vec![gold()]))
        .await
        .expect("Failed to open economy");
    (dir, economy)
}

#[tokio::test]
async fn fresh_store_has_placeholder_primary() {
    let dir = tempfile::tempdir().unwrap();
    let economy = Economy::open(&config_in(&dir, Vec::new())).await.unwrap();

    let primary = economy.registry().primary().await.unwrap();
    assert_eq!(primary.identifier, "placeholder");
    economy.close().await;
}

#[tokio::test]
async fn configured_primary_replaces_placeholder() {
    let (_dir, economy) = open_with_gold().await;
    let ids: Vec<String> = economy
        .registry()
        .list()
        .await
        .into_iter()
        .map(|c| c.identifier)
        .collect();
    assert_eq!(ids, vec!["gold".to_owned()]);
}

#[tokio::test]
async fn reopening_does_not_duplicate_configured_currencies() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir, vec![gold(), Currency::new("silver", "S", 1)]);

    let first = Economy::open(&config).await.unwrap();
    first.close().await;
    let second = Economy::open(&config).await.unwrap();

    assert_eq!(second.registry().len().await, 2);
    assert_eq!(second.registry().primary_identifier().await.unwrap(), "gold");
}

#[tokio::test]
async fn player_transactions() {
    let (_dir, economy) = open_with_gold().await;
    let player = economy.player(PlayerId::new());

    // First read materializes the starting balance.
    assert_eq!(player.balance("gold").await.unwrap(), Decimal::new(100, 0));

    let tx = EconomyTransaction::builder(TransactionKind::Withdrawal, "gold")
        .amount(Decimal::new(2550, 2))
        .initiator(Initiator::Player(player.id()))
        .reason("shop purchase")
        .build()
        .unwrap();
    assert_eq!(player.transact(&tx).await.unwrap(), Decimal::new(7450, 2));

    let deposit = EconomyTransaction::deposit("gold", Decimal::new(5, 1)).unwrap();
    assert_eq!(player.transact(&deposit).await.unwrap(), Decimal::new(7500, 2));

    let reset = EconomyTransaction::set("gold", Decimal::ZERO).unwrap();
    assert_eq!(player.transact(&reset).await.unwrap(), Decimal::ZERO);

    assert_eq!(
        player.held_currencies().await.unwrap(),
        BTreeSet::from(["gold".to_owned()])
    );
    assert_eq!(economy.player_ids().await.unwrap(), vec![player.id()]);

    assert!(player.delete().await.unwrap());
    assert!(!economy.has_account(player.account_id()).await.unwrap());
}

#[tokio::test]
async fn withdrawal_may_overdraw() {
    let (_dir, economy) = open_with_gold().await;
    let bank = economy.non_player("bank");

    let tx = EconomyTransaction::withdrawal("gold", Decimal::new(40, 0)).unwrap();
    assert_eq!(bank.transact(&tx).await.unwrap(), Decimal::new(-40, 0));
}

#[tokio::test]
async fn unknown_currency_is_reported() {
    let (_dir, economy) = open_with_gold().await;
    let player = economy.player(PlayerId::new());

    let tx = EconomyTransaction::deposit("copper", Decimal::ONE).unwrap();
    let result = player.transact(&tx).await;
    assert!(matches!(result, Err(EconomyError::CurrencyNotFound(ref id)) if id == "copper"));
    assert!(result.is_err_and(|e| e.is_not_found()));

    let result = player.balance("copper").await;
    assert!(matches!(result, Err(EconomyError::CurrencyNotFound(_))));
}

#[tokio::test]
async fn non_player_permissions() {
    let (_dir, economy) = open_with_gold().await;
    let guild = economy.non_player("guild_a");
    let (leader, member) = (PlayerId::new(), PlayerId::new());

    assert_eq!(guild.balance("gold").await.unwrap(), Decimal::ZERO);

    guild
        .set_permissions(leader, &PermissionKind::ALL, true)
        .await
        .unwrap();
    guild
        .set_permissions(member, &[PermissionKind::Balance, PermissionKind::Deposit], true)
        .await
        .unwrap();

    assert!(guild
        .has_permissions(leader, &[PermissionKind::Withdraw, PermissionKind::ModifyPermissions])
        .await
        .unwrap());
    assert!(!guild
        .has_permissions(member, &[PermissionKind::Withdraw])
        .await
        .unwrap());
    assert!(guild.is_member(member).await.unwrap());
    assert_eq!(
        guild.members().await.unwrap(),
        BTreeSet::from([leader, member])
    );
    assert_eq!(guild.permission_map().await.unwrap().len(), 2);

    assert_eq!(
        economy
            .accounts_for(member, &[PermissionKind::Deposit])
            .await
            .unwrap(),
        BTreeSet::from(["guild_a".to_owned()])
    );
    assert!(economy
        .accounts_for(member, &[PermissionKind::Withdraw])
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        economy.accounts_for(member, &[]).await.unwrap(),
        BTreeSet::from(["guild_a".to_owned()])
    );

    guild
        .set_permissions(member, &[PermissionKind::Deposit], false)
        .await
        .unwrap();
    assert_eq!(
        guild.permissions(member).await.unwrap(),
        BTreeSet::from([PermissionKind::Balance])
    );

    assert!(guild.delete().await.unwrap());
    assert!(guild.members().await.unwrap().is_empty());
    assert!(guild.permissions(leader).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_through_handles() {
    let (_dir, economy) = open_with_gold().await;
    let vault = economy.non_player("vault");
    let deposit = EconomyTransaction::deposit("gold", Decimal::new(25, 2)).unwrap();

    let tasks = (0..200).map(|_| {
        let vault = vault.clone();
        let deposit = deposit.clone();
        tokio::spawn(async move { vault.transact(&deposit).await })
    });
    for result in futures::future::join_all(tasks).await {
        result.expect("task panicked").expect("deposit failed");
    }

    assert_eq!(vault.balance("gold").await.unwrap(), Decimal::new(50, 0));
}

#[tokio::test]
async fn formatting_round_trips_through_parse() {
    let (_dir, economy) = open_with_gold().await;
    let gold = economy.currency("gold").await.unwrap();
    let player = economy.player(PlayerId::new());

    let amount = gold.parse("G1,234.567").unwrap();
    let set = EconomyTransaction::set("gold", amount).unwrap();
    let stored = player.transact(&set).await.unwrap();

    assert_eq!(gold.format(stored), "1,234.56");
}
