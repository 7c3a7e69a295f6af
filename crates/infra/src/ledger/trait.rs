use std::sync::Arc;

use async_trait::async_trait;

use stockledger_core::{AlertId, ItemId, LedgerResult, LocationId, TransactionId};
use stockledger_inventory::{
    Alert, CreateItem, CreateLocation, Inventory, InventoryTransaction, Item, Location,
    RaiseAlert, RecordTransaction,
};

use super::context::CallContext;

/// The operation set every storage engine implements identically.
///
/// This is the single boundary upstream code depends on. Engines are
/// interchangeable: the same inputs produce the same values and the same
/// [`LedgerError`](stockledger_core::LedgerError) kinds.
///
/// ## Contract
///
/// - `new_*` assign a fresh id; any caller-side identity is ignored.
/// - `update_*` replace the stored value by id and fail `NotFound` when the id
///   is absent (never upsert). `delete_*` fail `NotFound` when absent.
/// - `list_*` order is unspecified.
/// - Deleting an item or location leaves its transactions and balances in place.
/// - Every call observes `ctx` and fails `Cancelled` once it fires.
///
/// ## `new_inventory_transaction`
///
/// 1. `NotFound(items, item_id)` if the item is absent (checked first).
/// 2. `NotFound(locations, location_id)` if the location is absent.
/// 3. Resolve, creating if absent, the balance record for the pair.
/// 4. Apply the movement; `InvalidAction` on an unrecognised action.
/// 5. Persist the balance and the id-assigned, timestamped log entry.
/// 6. Return the finalized entry.
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    async fn new_item(&self, ctx: &CallContext, item: CreateItem) -> LedgerResult<Item>;

    async fn new_location(
        &self,
        ctx: &CallContext,
        location: CreateLocation,
    ) -> LedgerResult<Location>;

    async fn update_item(&self, ctx: &CallContext, item: Item) -> LedgerResult<Item>;

    async fn update_location(&self, ctx: &CallContext, location: Location)
    -> LedgerResult<Location>;

    async fn delete_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<()>;

    async fn delete_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<()>;

    async fn get_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<Item>;

    async fn get_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<Location>;

    async fn get_inventory_transaction(
        &self,
        ctx: &CallContext,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction>;

    async fn list_items(&self, ctx: &CallContext) -> LedgerResult<Vec<Item>>;

    async fn list_locations(&self, ctx: &CallContext) -> LedgerResult<Vec<Location>>;

    async fn list_inventory_transactions(
        &self,
        ctx: &CallContext,
    ) -> LedgerResult<Vec<InventoryTransaction>>;

    /// Every balance record touching `item_id`.
    async fn list_item_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<Inventory>>;

    /// Every balance record touching `location_id`.
    async fn list_location_inventory(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<Inventory>>;

    async fn list_item_inventory_transactions(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<InventoryTransaction>>;

    async fn list_location_inventory_transactions(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<InventoryTransaction>>;

    /// The core write path. See the trait docs for the protocol.
    async fn new_inventory_transaction(
        &self,
        ctx: &CallContext,
        txn: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction>;

    /// The materialized balance for a pair, created with a zero count if no
    /// transaction has touched it yet. Never `NotFound`.
    async fn lookup_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory>;

    async fn new_alert(&self, ctx: &CallContext, alert: RaiseAlert) -> LedgerResult<Alert>;

    async fn list_alerts(&self, ctx: &CallContext) -> LedgerResult<Vec<Alert>>;

    async fn delete_alert(&self, ctx: &CallContext, id: AlertId) -> LedgerResult<()>;
}

#[async_trait]
impl<B> InventoryBackend for Arc<B>
where
    B: InventoryBackend + ?Sized,
{
    async fn new_item(&self, ctx: &CallContext, item: CreateItem) -> LedgerResult<Item> {
        (**self).new_item(ctx, item).await
    }

    async fn new_location(
        &self,
        ctx: &CallContext,
        location: CreateLocation,
    ) -> LedgerResult<Location> {
        (**self).new_location(ctx, location).await
    }

    async fn update_item(&self, ctx: &CallContext, item: Item) -> LedgerResult<Item> {
        (**self).update_item(ctx, item).await
    }

    async fn update_location(
        &self,
        ctx: &CallContext,
        location: Location,
    ) -> LedgerResult<Location> {
        (**self).update_location(ctx, location).await
    }

    async fn delete_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<()> {
        (**self).delete_item(ctx, id).await
    }

    async fn delete_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<()> {
        (**self).delete_location(ctx, id).await
    }

    async fn get_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<Item> {
        (**self).get_item(ctx, id).await
    }

    async fn get_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<Location> {
        (**self).get_location(ctx, id).await
    }

    async fn get_inventory_transaction(
        &self,
        ctx: &CallContext,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction> {
        (**self).get_inventory_transaction(ctx, id).await
    }

    async fn list_items(&self, ctx: &CallContext) -> LedgerResult<Vec<Item>> {
        (**self).list_items(ctx).await
    }

    async fn list_locations(&self, ctx: &CallContext) -> LedgerResult<Vec<Location>> {
        (**self).list_locations(ctx).await
    }

    async fn list_inventory_transactions(
        &self,
        ctx: &CallContext,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        (**self).list_inventory_transactions(ctx).await
    }

    async fn list_item_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<Inventory>> {
        (**self).list_item_inventory(ctx, item_id).await
    }

    async fn list_location_inventory(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<Inventory>> {
        (**self).list_location_inventory(ctx, location_id).await
    }

    async fn list_item_inventory_transactions(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        (**self).list_item_inventory_transactions(ctx, item_id).await
    }

    async fn list_location_inventory_transactions(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        (**self)
            .list_location_inventory_transactions(ctx, location_id)
            .await
    }

    async fn new_inventory_transaction(
        &self,
        ctx: &CallContext,
        txn: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        (**self).new_inventory_transaction(ctx, txn).await
    }

    async fn lookup_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory> {
        (**self).lookup_inventory(ctx, item_id, location_id).await
    }

    async fn new_alert(&self, ctx: &CallContext, alert: RaiseAlert) -> LedgerResult<Alert> {
        (**self).new_alert(ctx, alert).await
    }

    async fn list_alerts(&self, ctx: &CallContext) -> LedgerResult<Vec<Alert>> {
        (**self).list_alerts(ctx).await
    }

    async fn delete_alert(&self, ctx: &CallContext, id: AlertId) -> LedgerResult<()> {
        (**self).delete_alert(ctx, id).await
    }
}
