//! Inventory ledger engines behind one backend contract.
//!
//! [`InMemoryBackend`] keeps everything in process; [`PostgresBackend`] talks to
//! a remote transactional store. [`PublishingBackend`] wraps either one and
//! announces committed transactions on an event bus.

pub mod context;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use context::{CallContext, CancelHandle};
pub use in_memory::{InMemoryBackend, InMemoryLedger};
pub use postgres::PostgresBackend;
pub use r#trait::InventoryBackend;

use async_trait::async_trait;
use tracing::warn;

use stockledger_core::{AlertId, ItemId, LedgerError, LedgerResult, LocationId, TransactionId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    Alert, CreateItem, CreateLocation, EVENT_SOURCE, Inventory, InventoryTransaction, Item,
    Location, RaiseAlert, RecordTransaction,
};

/// Adapter that publishes each committed inventory transaction to an `EventBus`.
///
/// Ordering invariant: **publish happens only after the engine committed**.
/// A publish failure is reported as [`LedgerError::Publish`] but the
/// transaction stays committed; delivery is at-least-once.
pub struct PublishingBackend<B, P> {
    backend: B,
    bus: P,
}

impl<B, P> PublishingBackend<B, P> {
    pub fn new(backend: B, bus: P) -> Self {
        Self { backend, bus }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bus(&self) -> &P {
        &self.bus
    }

    pub fn into_parts(self) -> (B, P) {
        (self.backend, self.bus)
    }
}

#[async_trait]
impl<B, P> InventoryBackend for PublishingBackend<B, P>
where
    B: InventoryBackend,
    P: EventBus<EventEnvelope<InventoryTransaction>>,
{
    async fn new_inventory_transaction(
        &self,
        ctx: &CallContext,
        txn: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        // 1) Commit (durable step)
        let committed = self.backend.new_inventory_transaction(ctx, txn).await?;

        // 2) Publish the committed transaction
        if let Err(err) = self
            .bus
            .publish(EventEnvelope::from_event(EVENT_SOURCE, &committed))
            .await
        {
            warn!(
                transaction_id = %committed.id,
                error = %err,
                "inventory transaction committed but not published"
            );
            return Err(LedgerError::Publish {
                transaction_id: committed.id.to_string(),
                message: err.to_string(),
            });
        }

        Ok(committed)
    }

    async fn new_item(&self, ctx: &CallContext, item: CreateItem) -> LedgerResult<Item> {
        self.backend.new_item(ctx, item).await
    }

    async fn new_location(
        &self,
        ctx: &CallContext,
        location: CreateLocation,
    ) -> LedgerResult<Location> {
        self.backend.new_location(ctx, location).await
    }

    async fn update_item(&self, ctx: &CallContext, item: Item) -> LedgerResult<Item> {
        self.backend.update_item(ctx, item).await
    }

    async fn update_location(
        &self,
        ctx: &CallContext,
        location: Location,
    ) -> LedgerResult<Location> {
        self.backend.update_location(ctx, location).await
    }

    async fn delete_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<()> {
        self.backend.delete_item(ctx, id).await
    }

    async fn delete_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<()> {
        self.backend.delete_location(ctx, id).await
    }

    async fn get_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<Item> {
        self.backend.get_item(ctx, id).await
    }

    async fn get_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<Location> {
        self.backend.get_location(ctx, id).await
    }

    async fn get_inventory_transaction(
        &self,
        ctx: &CallContext,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction> {
        self.backend.get_inventory_transaction(ctx, id).await
    }

    async fn list_items(&self, ctx: &CallContext) -> LedgerResult<Vec<Item>> {
        self.backend.list_items(ctx).await
    }

    async fn list_locations(&self, ctx: &CallContext) -> LedgerResult<Vec<Location>> {
        self.backend.list_locations(ctx).await
    }

    async fn list_inventory_transactions(
        &self,
        ctx: &CallContext,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.backend.list_inventory_transactions(ctx).await
    }

    async fn list_item_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<Inventory>> {
        self.backend.list_item_inventory(ctx, item_id).await
    }

    async fn list_location_inventory(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<Inventory>> {
        self.backend.list_location_inventory(ctx, location_id).await
    }

    async fn list_item_inventory_transactions(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.backend
            .list_item_inventory_transactions(ctx, item_id)
            .await
    }

    async fn list_location_inventory_transactions(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        self.backend
            .list_location_inventory_transactions(ctx, location_id)
            .await
    }

    async fn lookup_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory> {
        self.backend.lookup_inventory(ctx, item_id, location_id).await
    }

    async fn new_alert(&self, ctx: &CallContext, alert: RaiseAlert) -> LedgerResult<Alert> {
        self.backend.new_alert(ctx, alert).await
    }

    async fn list_alerts(&self, ctx: &CallContext) -> LedgerResult<Vec<Alert>> {
        self.backend.list_alerts(ctx).await
    }

    async fn delete_alert(&self, ctx: &CallContext, id: AlertId) -> LedgerResult<()> {
        self.backend.delete_alert(ctx, id).await
    }
}
