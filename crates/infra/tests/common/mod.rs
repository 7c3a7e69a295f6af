//! Backend conformance suite.
//!
//! Every check takes any `InventoryBackend` and must hold for all engines.
//! Checks only look at entities they created themselves, so they also run
//! against a shared, non-empty database.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use stockledger_core::{Collection, ItemId, LedgerError, LocationId, TransactionId};
use stockledger_infra::{CallContext, InventoryBackend};
use stockledger_inventory::{
    Action, CreateItem, CreateLocation, InventoryTransaction, Item, Location, RaiseAlert,
    RecordTransaction, balance_from_history,
};

pub fn ctx() -> CallContext {
    CallContext::background()
}

pub async fn seed<B: InventoryBackend + ?Sized>(backend: &B) -> (Item, Location) {
    let item = backend
        .new_item(&ctx(), CreateItem::new("i1", "widget"))
        .await
        .unwrap();
    let location = backend
        .new_location(&ctx(), CreateLocation::new("l1", "main"))
        .await
        .unwrap();
    (item, location)
}

fn txn_ids<'a>(txns: impl IntoIterator<Item = &'a InventoryTransaction>) -> HashSet<TransactionId> {
    txns.into_iter().map(|t| t.id).collect()
}

/// ADD 100, REMOVE 30, RECOUNT 0, REMOVE 5 ends at -5, and both filtered log
/// views return exactly those four entries.
pub async fn add_remove_recount_scenario<B: InventoryBackend + ?Sized>(backend: &B) {
    let (item, location) = seed(backend).await;

    let steps = [
        (Action::Add, 100, 100),
        (Action::Remove, 30, 70),
        (Action::Recount, 0, 0),
        (Action::Remove, 5, -5),
    ];
    let mut recorded = Vec::new();
    for (action, count, expected) in steps {
        let txn = backend
            .new_inventory_transaction(
                &ctx(),
                RecordTransaction::new(item.id, location.id, action.clone(), count)
                    .note("cycle count")
                    .created_by("tester"),
            )
            .await
            .unwrap();
        assert_eq!(txn.action, action);
        assert_eq!(txn.count, count);

        let balance = backend
            .lookup_inventory(&ctx(), item.id, location.id)
            .await
            .unwrap();
        assert_eq!(balance.count, expected);
        recorded.push(txn);
    }

    let expected_ids = txn_ids(&recorded);
    let by_item = backend
        .list_item_inventory_transactions(&ctx(), item.id)
        .await
        .unwrap();
    let by_location = backend
        .list_location_inventory_transactions(&ctx(), location.id)
        .await
        .unwrap();
    assert_eq!(txn_ids(&by_item), expected_ids);
    assert_eq!(txn_ids(&by_location), expected_ids);

    let all = txn_ids(&backend.list_inventory_transactions(&ctx()).await.unwrap());
    assert!(expected_ids.is_subset(&all));

    // The stored balance is the fold of the history in creation order.
    let mut history = by_item;
    history.sort_by_key(|t| (t.timestamp, t.id));
    assert_eq!(balance_from_history(&history).unwrap(), -5);

    for txn in &recorded {
        let stored = backend
            .get_inventory_transaction(&ctx(), txn.id)
            .await
            .unwrap();
        assert_eq!(&stored, txn);
        assert_eq!(stored.note, "cycle count");
        assert_eq!(stored.created_by, "tester");
    }
}

pub async fn first_lookup_returns_zero_balance<B: InventoryBackend + ?Sized>(backend: &B) {
    let (item, location) = seed(backend).await;

    let first = backend
        .lookup_inventory(&ctx(), item.id, location.id)
        .await
        .unwrap();
    let again = backend
        .lookup_inventory(&ctx(), item.id, location.id)
        .await
        .unwrap();

    assert_eq!(first.count, 0);
    assert_eq!((first.item_id, first.location_id), (item.id, location.id));
    assert_eq!(again, first);

    let by_item = backend.list_item_inventory(&ctx(), item.id).await.unwrap();
    let by_location = backend
        .list_location_inventory(&ctx(), location.id)
        .await
        .unwrap();
    assert_eq!(by_item.len(), 1);
    assert_eq!(by_location.len(), 1);
}

pub async fn item_is_checked_before_location<B: InventoryBackend + ?Sized>(backend: &B) {
    let missing_item = ItemId::new();
    let missing_location = LocationId::new();

    let err = backend
        .new_inventory_transaction(
            &ctx(),
            RecordTransaction::new(missing_item, missing_location, Action::Add, 1),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::item_not_found(missing_item));

    let (item, _) = seed(backend).await;
    let err = backend
        .new_inventory_transaction(
            &ctx(),
            RecordTransaction::new(item.id, missing_location, Action::Add, 1),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::location_not_found(missing_location));
}

pub async fn unknown_action_is_rejected<B: InventoryBackend + ?Sized>(backend: &B) {
    let (item, location) = seed(backend).await;

    let err = backend
        .new_inventory_transaction(
            &ctx(),
            RecordTransaction::new(item.id, location.id, Action::from("TRANSFER"), 3),
        )
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::InvalidAction("TRANSFER".into()));
    assert!(
        backend
            .list_item_inventory_transactions(&ctx(), item.id)
            .await
            .unwrap()
            .is_empty()
    );
}

pub async fn deleting_item_keeps_history<B: InventoryBackend + ?Sized>(backend: &B) {
    let (item, location) = seed(backend).await;
    let txn = backend
        .new_inventory_transaction(
            &ctx(),
            RecordTransaction::new(item.id, location.id, Action::Add, 8),
        )
        .await
        .unwrap();

    backend.delete_item(&ctx(), item.id).await.unwrap();

    assert!(backend.get_item(&ctx(), item.id).await.unwrap_err().is_not_found());
    assert_eq!(
        backend.get_inventory_transaction(&ctx(), txn.id).await.unwrap().id,
        txn.id
    );
    let balances = backend.list_item_inventory(&ctx(), item.id).await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].count, 8);

    // Existence is only checked when a new transaction is created.
    let err = backend
        .new_inventory_transaction(
            &ctx(),
            RecordTransaction::new(item.id, location.id, Action::Add, 1),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::item_not_found(item.id));
}

pub async fn update_never_upserts<B: InventoryBackend + ?Sized>(backend: &B) {
    let ghost = CreateItem::new("ghost", "").with_id(ItemId::new());
    let err = backend.update_item(&ctx(), ghost.clone()).await.unwrap_err();
    assert_eq!(err, LedgerError::item_not_found(ghost.id));
    assert!(backend.get_item(&ctx(), ghost.id).await.is_err());

    let ghost = CreateLocation::new("ghost", "").with_id(LocationId::new());
    let err = backend
        .update_location(&ctx(), ghost.clone())
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::location_not_found(ghost.id));
    assert!(backend.get_location(&ctx(), ghost.id).await.is_err());
}

pub async fn update_replaces_stored_value<B: InventoryBackend + ?Sized>(backend: &B) {
    let (mut item, mut location) = seed(backend).await;
    item.name = "i1-renamed".into();
    location.warehouse = "overflow".into();

    backend.update_item(&ctx(), item.clone()).await.unwrap();
    backend.update_location(&ctx(), location.clone()).await.unwrap();

    assert_eq!(backend.get_item(&ctx(), item.id).await.unwrap(), item);
    assert_eq!(backend.get_location(&ctx(), location.id).await.unwrap(), location);
}

pub async fn create_assigns_fresh_ids<B: InventoryBackend + ?Sized>(backend: &B) {
    let a = backend.new_item(&ctx(), CreateItem::new("same", "")).await.unwrap();
    let b = backend.new_item(&ctx(), CreateItem::new("same", "")).await.unwrap();
    assert_ne!(a.id, b.id);

    let listed: HashSet<ItemId> = backend
        .list_items(&ctx())
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert!(listed.contains(&a.id) && listed.contains(&b.id));

    let (_, location) = seed(backend).await;
    let listed: Vec<LocationId> = backend
        .list_locations(&ctx())
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    assert!(listed.contains(&location.id));
}

pub async fn missing_ids_are_not_found<B: InventoryBackend + ?Sized>(backend: &B) {
    let txn_id = TransactionId::new();
    assert_eq!(
        backend
            .get_inventory_transaction(&ctx(), txn_id)
            .await
            .unwrap_err(),
        LedgerError::not_found(Collection::InventoryTransactions, txn_id)
    );

    let item_id = ItemId::new();
    assert_eq!(
        backend.delete_item(&ctx(), item_id).await.unwrap_err(),
        LedgerError::item_not_found(item_id)
    );

    let (_, location) = seed(backend).await;
    backend.delete_location(&ctx(), location.id).await.unwrap();
    assert_eq!(
        backend.delete_location(&ctx(), location.id).await.unwrap_err(),
        LedgerError::location_not_found(location.id)
    );
}

pub async fn alerts_round_trip<B: InventoryBackend + ?Sized>(backend: &B) {
    let (item, _) = seed(backend).await;

    let alert = backend
        .new_alert(&ctx(), RaiseAlert::new(item.id, "stock below reorder point"))
        .await
        .unwrap();
    let listed = backend.list_alerts(&ctx()).await.unwrap();
    assert_eq!(listed.iter().find(|a| a.id == alert.id), Some(&alert));

    backend.delete_alert(&ctx(), alert.id).await.unwrap();
    assert_eq!(
        backend.delete_alert(&ctx(), alert.id).await.unwrap_err(),
        LedgerError::alert_not_found(alert.id)
    );
}

pub async fn cancelled_call_fails<B: InventoryBackend + ?Sized>(backend: &B) {
    let (cancelled, handle) = CallContext::cancellable();
    handle.cancel();

    let err = backend
        .new_item(&cancelled, CreateItem::new("never", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Cancelled { .. }));
}

/// Racing writers on a pair nobody has touched yet: each call either commits
/// or fails with `Conflict`, and the pair ends up with exactly one balance
/// record whose count matches the committed movements.
pub async fn concurrent_new_pair_never_duplicates<B>(backend: Arc<B>, writers: usize)
where
    B: InventoryBackend + ?Sized + 'static,
{
    let (item, location) = seed(backend.as_ref()).await;

    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .new_inventory_transaction(
                        &ctx(),
                        RecordTransaction::new(item.id, location.id, Action::Add, 1),
                    )
                    .await
            })
        })
        .collect();

    let mut committed = 0i64;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {err}"),
        }
    }

    let records = backend.list_item_inventory(&ctx(), item.id).await.unwrap();
    assert_eq!(records.len(), 1, "duplicate balance records for one pair");
    assert_eq!(records[0].count, committed);

    let logged = backend
        .list_item_inventory_transactions(&ctx(), item.id)
        .await
        .unwrap();
    assert_eq!(logged.len() as i64, committed);
}

/// First movements on many brand-new pairs at once: pairs are independent, so
/// every call commits and each pair holds exactly its own movement.
pub async fn distinct_new_pairs_commit_independently<B>(backend: Arc<B>, pairs: usize)
where
    B: InventoryBackend + ?Sized + 'static,
{
    let mut seeded = Vec::with_capacity(pairs);
    for _ in 0..pairs {
        seeded.push(seed(backend.as_ref()).await);
    }

    let handles: Vec<_> = seeded
        .iter()
        .enumerate()
        .map(|(n, (item, location))| {
            let backend = backend.clone();
            let request = RecordTransaction::new(item.id, location.id, Action::Add, n as i64 + 1);
            tokio::spawn(async move { backend.new_inventory_transaction(&ctx(), request).await })
        })
        .collect();

    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => {}
            Err(err) if err.is_conflict() => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(conflicts, 0, "conflicts on {pairs} distinct brand-new pairs");

    for (n, (item, location)) in seeded.iter().enumerate() {
        let records = backend.list_item_inventory(&ctx(), item.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location_id, location.id);
        assert_eq!(records[0].count, n as i64 + 1);
    }
}
