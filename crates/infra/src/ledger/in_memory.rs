use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, error};

use stockledger_core::{
    AlertId, Entity, ItemId, LedgerError, LedgerResult, LocationId, TransactionId,
};
use stockledger_inventory::{
    Alert, CreateItem, CreateLocation, Inventory, InventoryTransaction, Item, Location,
    RaiseAlert, RecordTransaction,
};

use super::context::CallContext;
use super::r#trait::InventoryBackend;

type PairKey = (ItemId, LocationId);

/// Single-writer in-process ledger.
///
/// Balance records live in one map keyed by the (item, location) pair. Two
/// secondary indices hold pair keys (never copies of the record), so a
/// mutation is visible through both paths at once.
///
/// No locking: mutation goes through `&mut self`, so callers sharing one
/// ledger must serialize access themselves (see [`InMemoryBackend`]).
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    items: HashMap<ItemId, Item>,
    locations: HashMap<LocationId, Location>,
    transactions: HashMap<TransactionId, InventoryTransaction>,
    alerts: HashMap<AlertId, Alert>,

    inventories: HashMap<PairKey, Inventory>,
    by_item: HashMap<ItemId, HashSet<PairKey>>,
    by_location: HashMap<LocationId, HashSet<PairKey>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_item(&mut self, item: CreateItem) -> Item {
        let item = item.with_id(ItemId::new());
        self.items.insert(item.id, item.clone());
        item
    }

    pub fn new_location(&mut self, location: CreateLocation) -> Location {
        let location = location.with_id(LocationId::new());
        self.locations.insert(location.id, location.clone());
        location
    }

    pub fn update_item(&mut self, item: Item) -> LedgerResult<Item> {
        replace_existing(&mut self.items, item)
    }

    pub fn update_location(&mut self, location: Location) -> LedgerResult<Location> {
        replace_existing(&mut self.locations, location)
    }

    /// Balances and transactions referencing the item are kept.
    pub fn delete_item(&mut self, id: ItemId) -> LedgerResult<()> {
        remove_existing(&mut self.items, id)
    }

    pub fn delete_location(&mut self, id: LocationId) -> LedgerResult<()> {
        remove_existing(&mut self.locations, id)
    }

    pub fn get_item(&self, id: ItemId) -> LedgerResult<Item> {
        get_existing(&self.items, id)
    }

    pub fn get_location(&self, id: LocationId) -> LedgerResult<Location> {
        get_existing(&self.locations, id)
    }

    pub fn get_inventory_transaction(
        &self,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction> {
        get_existing(&self.transactions, id)
    }

    pub fn list_items(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn list_locations(&self) -> Vec<Location> {
        self.locations.values().cloned().collect()
    }

    pub fn list_inventory_transactions(&self) -> Vec<InventoryTransaction> {
        self.transactions.values().cloned().collect()
    }

    pub fn list_item_inventory(&self, item_id: ItemId) -> LedgerResult<Vec<Inventory>> {
        self.resolve_keys(self.by_item.get(&item_id))
    }

    pub fn list_location_inventory(&self, location_id: LocationId) -> LedgerResult<Vec<Inventory>> {
        self.resolve_keys(self.by_location.get(&location_id))
    }

    pub fn list_item_inventory_transactions(&self, item_id: ItemId) -> Vec<InventoryTransaction> {
        self.transactions
            .values()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect()
    }

    pub fn list_location_inventory_transactions(
        &self,
        location_id: LocationId,
    ) -> Vec<InventoryTransaction> {
        self.transactions
            .values()
            .filter(|t| t.location_id == location_id)
            .cloned()
            .collect()
    }

    /// Record one stock movement against the pair's balance.
    ///
    /// The balance record is materialized before the action is checked, so an
    /// `InvalidAction` still leaves a zero-count record behind for a new pair.
    pub fn new_inventory_transaction(
        &mut self,
        request: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        if !self.items.contains_key(&request.item_id) {
            return Err(LedgerError::item_not_found(request.item_id));
        }
        if !self.locations.contains_key(&request.location_id) {
            return Err(LedgerError::location_not_found(request.location_id));
        }

        let mut txn = request.into_transaction(TransactionId::new());
        let inventory = self.resolve_inventory(txn.item_id, txn.location_id)?;
        inventory.apply_transaction(&mut txn)?;

        debug!(
            transaction_id = %txn.id,
            item_id = %txn.item_id,
            location_id = %txn.location_id,
            action = %txn.action,
            count = inventory.count,
            "inventory transaction recorded"
        );

        self.transactions.insert(txn.id, txn.clone());
        Ok(txn)
    }

    pub fn lookup_inventory(
        &mut self,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory> {
        self.resolve_inventory(item_id, location_id).map(|inv| inv.clone())
    }

    pub fn new_alert(&mut self, alert: RaiseAlert) -> Alert {
        let alert = alert.with_id(AlertId::new());
        self.alerts.insert(alert.id, alert.clone());
        alert
    }

    pub fn list_alerts(&self) -> Vec<Alert> {
        self.alerts.values().cloned().collect()
    }

    pub fn delete_alert(&mut self, id: AlertId) -> LedgerResult<()> {
        remove_existing(&mut self.alerts, id)
    }

    /// Audit both secondary indices against the record map.
    pub fn verify_indices(&self) -> LedgerResult<()> {
        for key in self.inventories.keys() {
            self.check_pair(*key, true)?;
        }

        let indexed = self
            .by_item
            .iter()
            .flat_map(|(id, keys)| keys.iter().map(move |k| (k.0 == *id, *k)))
            .chain(
                self.by_location
                    .iter()
                    .flat_map(|(id, keys)| keys.iter().map(move |k| (k.1 == *id, *k))),
            );
        for (in_right_bucket, key) in indexed {
            if !in_right_bucket {
                return Err(self.divergence(key, "pair filed under the wrong index bucket"));
            }
            if !self.inventories.contains_key(&key) {
                return Err(self.divergence(key, "index entry without a balance record"));
            }
        }
        Ok(())
    }

    fn resolve_inventory(
        &mut self,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<&mut Inventory> {
        let key = (item_id, location_id);
        let exists = self.check_pair(key, false)?;

        if !exists {
            // All three inserts happen together or not at all.
            self.inventories
                .insert(key, Inventory::empty(item_id, location_id));
            self.by_item.entry(item_id).or_default().insert(key);
            self.by_location.entry(location_id).or_default().insert(key);
        }

        self.inventories
            .get_mut(&key)
            .ok_or_else(|| LedgerError::inconsistent("balance record vanished after insert"))
    }

    /// Whether the pair is fully present. A partial presence is an error.
    fn check_pair(&self, key: PairKey, must_exist: bool) -> LedgerResult<bool> {
        let in_records = self.inventories.contains_key(&key);
        let in_item = self.by_item.get(&key.0).is_some_and(|s| s.contains(&key));
        let in_location = self.by_location.get(&key.1).is_some_and(|s| s.contains(&key));

        match (in_records, in_item, in_location) {
            (true, true, true) => Ok(true),
            (false, false, false) if !must_exist => Ok(false),
            _ => Err(self.divergence(
                key,
                &format!(
                    "record present: {in_records}, item index: {in_item}, location index: {in_location}"
                ),
            )),
        }
    }

    fn divergence(&self, key: PairKey, detail: &str) -> LedgerError {
        error!(
            item_id = %key.0,
            location_id = %key.1,
            detail,
            "inventory indices disagree"
        );
        LedgerError::inconsistent(format!(
            "indices disagree for item {} at location {}: {detail}",
            key.0, key.1
        ))
    }

    fn resolve_keys(&self, keys: Option<&HashSet<PairKey>>) -> LedgerResult<Vec<Inventory>> {
        keys.into_iter()
            .flatten()
            .map(|key| {
                self.inventories
                    .get(key)
                    .cloned()
                    .ok_or_else(|| self.divergence(*key, "index entry without a balance record"))
            })
            .collect()
    }
}

fn get_existing<E: Entity + Clone>(map: &HashMap<E::Id, E>, id: E::Id) -> LedgerResult<E> {
    map.get(&id)
        .cloned()
        .ok_or_else(|| LedgerError::not_found(E::COLLECTION, id))
}

/// Replace by id; never inserts.
fn replace_existing<E: Entity + Clone>(map: &mut HashMap<E::Id, E>, value: E) -> LedgerResult<E> {
    let id = value.id();
    let slot = map
        .get_mut(&id)
        .ok_or_else(|| LedgerError::not_found(E::COLLECTION, id))?;
    *slot = value.clone();
    Ok(value)
}

fn remove_existing<E: Entity>(map: &mut HashMap<E::Id, E>, id: E::Id) -> LedgerResult<()> {
    map.remove(&id)
        .map(|_| ())
        .ok_or_else(|| LedgerError::not_found(E::COLLECTION, id))
}

/// [`InMemoryLedger`] behind the async backend contract.
///
/// One mutex provides the external serialization the ledger needs. It is
/// never held across an await point; a poisoned lock surfaces as
/// `InternalInconsistency`.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    ledger: Mutex<InMemoryLedger>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_indices(&self) -> LedgerResult<()> {
        self.with_ledger(|ledger| ledger.verify_indices())
    }

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut InMemoryLedger) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut guard = self
            .ledger
            .lock()
            .map_err(|_| LedgerError::inconsistent("in-memory ledger lock poisoned"))?;
        f(&mut *guard)
    }

    fn call<T>(
        &self,
        ctx: &CallContext,
        f: impl FnOnce(&mut InMemoryLedger) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        ctx.check()?;
        self.with_ledger(f)
    }
}

#[async_trait]
impl InventoryBackend for InMemoryBackend {
    async fn new_item(&self, ctx: &CallContext, item: CreateItem) -> LedgerResult<Item> {
        self.call(ctx, |l| Ok(l.new_item(item)))
    }

    async fn new_location(
        &self,
        ctx: &CallContext,
        location: CreateLocation,
    ) -> LedgerResult<Location> {
        self.call(ctx, |l| Ok(l.new_location(location)))
    }

    async fn update_item(&self, ctx: &CallContext, item: Item) -> LedgerResult<Item> {
        self.call(ctx, |l| l.update_item(item))
    }

    async fn update_location(
        &self,
        ctx: &CallContext,
        location: Location,
    ) -> LedgerResult<Location> {
        self.call(ctx, |l| l.update_location(location))
    }

    async fn delete_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<()> {
        self.call(ctx, |l| l.delete_item(id))
    }

    async fn delete_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<()> {
        self.call(ctx, |l| l.delete_location(id))
    }

    async fn get_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<Item> {
        self.call(ctx, |l| l.get_item(id))
    }

    async fn get_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<Location> {
        self.call(ctx, |l| l.get_location(id))
    }

    async fn get_inventory_transaction(
        &self,
        ctx: &CallContext,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction> {
        self.call(ctx, |l| l.get_inventory_transaction(id))
    }

    async fn list_items(&self, ctx: &CallContext) -> LedgerResult<Vec<Item>> {
        self.call(ctx, |l| Ok(l.list_items()))
    }

    async fn list_locations(&self, ctx: &CallContext) -> LedgerResult<Vec<Location>> {
        self.call(ctx, |l| Ok(l.list_locations()))
    }

    async fn list_inventory_transactions(
        &self,
        ctx: &CallContext,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.call(ctx, |l| Ok(l.list_inventory_transactions()))
    }

    async fn list_item_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<Inventory>> {
        self.call(ctx, |l| l.list_item_inventory(item_id))
    }

    async fn list_location_inventory(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<Inventory>> {
        self.call(ctx, |l| l.list_location_inventory(location_id))
    }

    async fn list_item_inventory_transactions(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.call(ctx, |l| Ok(l.list_item_inventory_transactions(item_id)))
    }

    async fn list_location_inventory_transactions(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.call(ctx, |l| Ok(l.list_location_inventory_transactions(location_id)))
    }

    async fn new_inventory_transaction(
        &self,
        ctx: &CallContext,
        txn: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        self.call(ctx, |l| l.new_inventory_transaction(txn))
    }

    async fn lookup_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory> {
        self.call(ctx, |l| l.lookup_inventory(item_id, location_id))
    }

    async fn new_alert(&self, ctx: &CallContext, alert: RaiseAlert) -> LedgerResult<Alert> {
        self.call(ctx, |l| Ok(l.new_alert(alert)))
    }

    async fn list_alerts(&self, ctx: &CallContext) -> LedgerResult<Vec<Alert>> {
        self.call(ctx, |l| Ok(l.list_alerts()))
    }

    async fn delete_alert(&self, ctx: &CallContext, id: AlertId) -> LedgerResult<()> {
        self.call(ctx, |l| l.delete_alert(id))
    }
}
