//! Postgres-backed remote transactional engine.
//!
//! Concurrency control comes from the store alone: a transaction-scoped
//! advisory lock per (item, location) pair for find-or-create, and
//! `REPEATABLE READ` first-updater-wins for applying a movement. Writers on
//! different pairs never wait on or abort each other. The engine never
//! retries.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError |
//! |------------|----------------------|-------------|
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (unique violation) | `23505` | `Conflict` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | Any other | `Store` |
//!
//! ## Recording a transaction
//!
//! Discovering-or-creating the balance row and mutating it happen in two
//! separate transactions:
//!
//! - **A (find-or-create)**: lock the pair, then select its rows. None:
//!   insert a zero-count row. One: take its id. More: `InternalInconsistency`.
//!   Runs at `READ COMMITTED` so the select after the lock wait sees a row a
//!   previous lock holder committed.
//! - **B (apply)**: at `REPEATABLE READ`, re-read the row by id, apply the
//!   movement, update it and insert the log entry, commit.
//!
//! Another writer can interleave between A and B. B still re-reads and its
//! commit fails with `Conflict` if the row changed under it, so no update is
//! lost, but the two phases are not linearizable as a whole.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, debug, error, instrument, warn};
use uuid::Uuid;

use async_trait::async_trait;
use stockledger_core::{
    AlertId, Collection, ItemId, LedgerError, LedgerResult, LocationId, TransactionId,
};
use stockledger_inventory::{
    Action, Alert, CreateItem, CreateLocation, Inventory, InventoryTransaction, Item, Location,
    RaiseAlert, RecordTransaction,
};

use super::context::CallContext;
use super::r#trait::InventoryBackend;

/// Arbitrary key serializing concurrent `ensure_schema` calls.
const SCHEMA_LOCK_KEY: i64 = 0x5354_4f43_4b4c_4447;

/// Transaction-scoped lock on one pair, keyed by a hash of `inventories/<item>/<location>`.
const PAIR_LOCK: &str = "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        warehouse TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventories (
        id UUID PRIMARY KEY,
        item_id UUID NOT NULL,
        location_id UUID NOT NULL,
        count BIGINT NOT NULL,
        last_updated TIMESTAMPTZ NOT NULL
    )
    "#,
    // Not UNIQUE: one row per pair is upheld by find-or-create under the pair lock.
    "CREATE INDEX IF NOT EXISTS inventories_pair_idx ON inventories (item_id, location_id)",
    "CREATE INDEX IF NOT EXISTS inventories_location_idx ON inventories (location_id)",
    r#"
    CREATE TABLE IF NOT EXISTS inventory_transactions (
        id UUID PRIMARY KEY,
        item_id UUID NOT NULL,
        location_id UUID NOT NULL,
        action TEXT NOT NULL,
        count BIGINT NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        timestamp TIMESTAMPTZ NOT NULL,
        created_by TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS inventory_transactions_item_idx ON inventory_transactions (item_id)",
    "CREATE INDEX IF NOT EXISTS inventory_transactions_location_idx ON inventory_transactions (location_id)",
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id UUID PRIMARY KEY,
        item_id UUID NOT NULL,
        text TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL
    )
    "#,
];

const TRANSACTION_COLUMNS: &str =
    "id, item_id, location_id, action, count, note, timestamp, created_by";

/// Remote transactional engine over a Postgres connection pool.
///
/// `Send + Sync`; clone freely, all clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: Arc<PgPool>,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> LedgerResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::store("ensure_schema", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::store("ensure_schema", e))?;

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| LedgerError::store("ensure_schema", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| LedgerError::store("ensure_schema", e))
    }

    async fn begin_repeatable_read(
        &self,
        operation: &str,
    ) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::store(operation, e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::store(operation, e))?;

        Ok(tx)
    }

    #[instrument(skip(self, item), fields(item_id), err)]
    pub async fn insert_item(&self, item: CreateItem) -> LedgerResult<Item> {
        let item = item.with_id(ItemId::new());
        Span::current().record("item_id", tracing::field::display(item.id));

        sqlx::query("INSERT INTO items (id, name, description) VALUES ($1, $2, $3)")
            .bind(*item.id.as_uuid())
            .bind(&item.name)
            .bind(&item.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("new_item", Collection::Items, item.id, e))?;

        Ok(item)
    }

    #[instrument(skip(self, location), fields(location_id), err)]
    pub async fn insert_location(&self, location: CreateLocation) -> LedgerResult<Location> {
        let location = location.with_id(LocationId::new());
        Span::current().record("location_id", tracing::field::display(location.id));

        sqlx::query("INSERT INTO locations (id, name, warehouse) VALUES ($1, $2, $3)")
            .bind(*location.id.as_uuid())
            .bind(&location.name)
            .bind(&location.warehouse)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("new_location", Collection::Locations, location.id, e))?;

        Ok(location)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    pub async fn replace_item(&self, item: Item) -> LedgerResult<Item> {
        let result = sqlx::query("UPDATE items SET name = $2, description = $3 WHERE id = $1")
            .bind(*item.id.as_uuid())
            .bind(&item.name)
            .bind(&item.description)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_item", Collection::Items, item.id, e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::item_not_found(item.id));
        }
        Ok(item)
    }

    #[instrument(skip(self, location), fields(location_id = %location.id), err)]
    pub async fn replace_location(&self, location: Location) -> LedgerResult<Location> {
        let result = sqlx::query("UPDATE locations SET name = $2, warehouse = $3 WHERE id = $1")
            .bind(*location.id.as_uuid())
            .bind(&location.name)
            .bind(&location.warehouse)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                map_sqlx_error("update_location", Collection::Locations, location.id, e)
            })?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::location_not_found(location.id));
        }
        Ok(location)
    }

    #[instrument(skip_all, fields(id = %id, collection = collection.as_str()), err)]
    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> LedgerResult<()> {
        // Table names come from a closed enum, never from input.
        let statement = match collection {
            Collection::Items => "DELETE FROM items WHERE id = $1",
            Collection::Locations => "DELETE FROM locations WHERE id = $1",
            Collection::Alerts => "DELETE FROM alerts WHERE id = $1",
            other => {
                return Err(LedgerError::inconsistent(format!(
                    "collection {} is never deleted from",
                    other.as_str()
                )));
            }
        };

        let result = sqlx::query(statement)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", collection, id, e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(collection, id));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(item_id = %id), err)]
    pub async fn fetch_item(&self, id: ItemId) -> LedgerResult<Item> {
        let row = sqlx::query("SELECT id, name, description FROM items WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", Collection::Items, id, e))?;
        decode::<ItemRow>(&row, "get_item").map(Into::into)
    }

    #[instrument(skip_all, fields(location_id = %id), err)]
    pub async fn fetch_location(&self, id: LocationId) -> LedgerResult<Location> {
        let row = sqlx::query("SELECT id, name, warehouse FROM locations WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_location", Collection::Locations, id, e))?;
        decode::<LocationRow>(&row, "get_location").map(Into::into)
    }

    #[instrument(skip_all, fields(transaction_id = %id), err)]
    pub async fn fetch_transaction(&self, id: TransactionId) -> LedgerResult<InventoryTransaction> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            map_sqlx_error(
                "get_inventory_transaction",
                Collection::InventoryTransactions,
                id,
                e,
            )
        })?;
        decode::<TransactionRow>(&row, "get_inventory_transaction").map(Into::into)
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_items(&self) -> LedgerResult<Vec<Item>> {
        let rows = sqlx::query("SELECT id, name, description FROM items")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("list_items", e))?;
        decode_all::<ItemRow, _>(&rows, "list_items")
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_locations(&self) -> LedgerResult<Vec<Location>> {
        let rows = sqlx::query("SELECT id, name, warehouse FROM locations")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("list_locations", e))?;
        decode_all::<LocationRow, _>(&rows, "list_locations")
    }

    /// Log entries, optionally filtered by item or location.
    #[instrument(skip(self), err)]
    pub async fn fetch_transactions(
        &self,
        filter: TransactionFilter,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        let base = format!("SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions");
        let (statement, id) = match filter {
            TransactionFilter::All => (base, None),
            TransactionFilter::Item(id) => {
                (format!("{base} WHERE item_id = $1"), Some(*id.as_uuid()))
            }
            TransactionFilter::Location(id) => {
                (format!("{base} WHERE location_id = $1"), Some(*id.as_uuid()))
            }
        };
        let mut query = sqlx::query(&statement);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("list_inventory_transactions", e))?;
        decode_all::<TransactionRow, _>(&rows, "list_inventory_transactions")
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_inventories(&self, filter: InventoryFilter) -> LedgerResult<Vec<Inventory>> {
        let (statement, id) = match filter {
            InventoryFilter::Item(id) => (
                "SELECT id, item_id, location_id, count, last_updated FROM inventories WHERE item_id = $1",
                *id.as_uuid(),
            ),
            InventoryFilter::Location(id) => (
                "SELECT id, item_id, location_id, count, last_updated FROM inventories WHERE location_id = $1",
                *id.as_uuid(),
            ),
        };
        let rows = sqlx::query(statement)
            .bind(id)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("list_inventory", e))?;
        decode_all::<InventoryRow, _>(&rows, "list_inventory")
    }

    async fn exists(&self, collection: Collection, id: Uuid) -> LedgerResult<bool> {
        let statement = match collection {
            Collection::Items => "SELECT EXISTS (SELECT 1 FROM items WHERE id = $1)",
            Collection::Locations => "SELECT EXISTS (SELECT 1 FROM locations WHERE id = $1)",
            other => {
                return Err(LedgerError::inconsistent(format!(
                    "existence check unsupported for {}",
                    other.as_str()
                )));
            }
        };
        let found: bool = sqlx::query_scalar(statement)
            .bind(id)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("exists", e))?;
        Ok(found)
    }

    /// Transaction A: the id of the pair's balance row, inserting a zero-count
    /// row when none exists.
    #[instrument(skip_all, fields(item_id = %item_id, location_id = %location_id), err)]
    pub async fn find_or_create_inventory(
        &self,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Uuid> {
        let pair = format!("{item_id}/{location_id}");
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::store("find_or_create_inventory", e))?;

        sqlx::query(PAIR_LOCK)
            .bind(format!("inventories/{pair}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_inventory", Collection::Inventories, &pair, e))?;

        let rows = sqlx::query("SELECT id FROM inventories WHERE item_id = $1 AND location_id = $2")
            .bind(*item_id.as_uuid())
            .bind(*location_id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| {
                map_sqlx_error("find_inventory", Collection::Inventories, &pair, e)
            })?;

        let inventory_ref = match rows.as_slice() {
            [] => {
                let id = Uuid::now_v7();
                let fresh = Inventory::empty(item_id, location_id);
                sqlx::query(
                    "INSERT INTO inventories (id, item_id, location_id, count, last_updated) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(id)
                .bind(*item_id.as_uuid())
                .bind(*location_id.as_uuid())
                .bind(fresh.count)
                .bind(fresh.last_updated)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    map_sqlx_error("create_inventory", Collection::Inventories, &pair, e)
                })?;
                debug!(inventory_ref = %id, "created zero-count inventory");
                id
            }
            [row] => row
                .try_get::<Uuid, _>("id")
                .map_err(|e| LedgerError::store("find_inventory", e))?,
            many => {
                error!(
                    item_id = %item_id,
                    location_id = %location_id,
                    records = many.len(),
                    "more than one inventory record for pair"
                );
                return Err(LedgerError::inconsistent(format!(
                    "{} inventory records for item {item_id} at location {location_id}",
                    many.len()
                )));
            }
        };

        tx.commit().await.map_err(|e| {
            map_sqlx_error("commit_find_or_create", Collection::Inventories, &pair, e)
        })?;

        Ok(inventory_ref)
    }

    #[instrument(skip_all, fields(inventory_ref = %inventory_ref), err)]
    async fn read_inventory(&self, inventory_ref: Uuid) -> LedgerResult<Inventory> {
        let row = sqlx::query(
            "SELECT id, item_id, location_id, count, last_updated FROM inventories WHERE id = $1",
        )
        .bind(inventory_ref)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_inventory", Collection::Inventories, inventory_ref, e))?;
        decode::<InventoryRow>(&row, "read_inventory").map(Into::into)
    }

    /// Transaction B: apply the movement to the row found by transaction A and
    /// append the log entry, atomically.
    #[instrument(skip_all, fields(inventory_ref = %inventory_ref, transaction_id), err)]
    async fn apply_to_inventory(
        &self,
        inventory_ref: Uuid,
        request: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        let mut tx = self.begin_repeatable_read("apply_transaction").await?;

        let row = sqlx::query(
            "SELECT id, item_id, location_id, count, last_updated FROM inventories WHERE id = $1",
        )
        .bind(inventory_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("read_inventory", Collection::Inventories, inventory_ref, e))?;
        let mut inventory: Inventory = decode::<InventoryRow>(&row, "read_inventory")?.into();

        let mut txn = request.into_transaction(TransactionId::new());
        Span::current().record("transaction_id", tracing::field::display(txn.id));
        inventory.apply_transaction(&mut txn)?;

        sqlx::query("UPDATE inventories SET count = $2, last_updated = $3 WHERE id = $1")
            .bind(inventory_ref)
            .bind(inventory.count)
            .bind(inventory.last_updated)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_sqlx_error("update_inventory", Collection::Inventories, inventory_ref, e)
            })?;

        sqlx::query(&format!(
            "INSERT INTO inventory_transactions ({TRANSACTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(*txn.id.as_uuid())
        .bind(*txn.item_id.as_uuid())
        .bind(*txn.location_id.as_uuid())
        .bind(txn.action.as_str())
        .bind(txn.count)
        .bind(&txn.note)
        .bind(txn.timestamp)
        .bind(&txn.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_sqlx_error(
                "insert_transaction",
                Collection::InventoryTransactions,
                txn.id,
                e,
            )
        })?;

        tx.commit().await.map_err(|e| {
            map_sqlx_error("commit_transaction", Collection::Inventories, inventory_ref, e)
        })?;

        debug!(
            transaction_id = %txn.id,
            action = %txn.action,
            count = inventory.count,
            "inventory transaction committed"
        );
        Ok(txn)
    }

    #[instrument(
        skip(self, request),
        fields(item_id = %request.item_id, location_id = %request.location_id),
        err
    )]
    pub async fn record_transaction(
        &self,
        request: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        if !self.exists(Collection::Items, *request.item_id.as_uuid()).await? {
            return Err(LedgerError::item_not_found(request.item_id));
        }
        if !self
            .exists(Collection::Locations, *request.location_id.as_uuid())
            .await?
        {
            return Err(LedgerError::location_not_found(request.location_id));
        }

        let inventory_ref = self
            .find_or_create_inventory(request.item_id, request.location_id)
            .await?;
        self.apply_to_inventory(inventory_ref, request).await
    }

    #[instrument(skip(self, alert), fields(alert_id, item_id = %alert.item_id), err)]
    pub async fn insert_alert(&self, alert: RaiseAlert) -> LedgerResult<Alert> {
        let alert = alert.with_id(AlertId::new());
        Span::current().record("alert_id", tracing::field::display(alert.id));

        sqlx::query("INSERT INTO alerts (id, item_id, text, timestamp) VALUES ($1, $2, $3, $4)")
            .bind(*alert.id.as_uuid())
            .bind(*alert.item_id.as_uuid())
            .bind(&alert.text)
            .bind(alert.timestamp)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("new_alert", Collection::Alerts, alert.id, e))?;

        Ok(alert)
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_alerts(&self) -> LedgerResult<Vec<Alert>> {
        let rows = sqlx::query("SELECT id, item_id, text, timestamp FROM alerts")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| LedgerError::store("list_alerts", e))?;
        decode_all::<AlertRow, _>(&rows, "list_alerts")
    }
}

/// Which log entries [`PostgresBackend::fetch_transactions`] returns.
#[derive(Debug, Clone, Copy)]
pub enum TransactionFilter {
    All,
    Item(ItemId),
    Location(LocationId),
}

/// Which balance rows [`PostgresBackend::fetch_inventories`] returns.
#[derive(Debug, Clone, Copy)]
pub enum InventoryFilter {
    Item(ItemId),
    Location(LocationId),
}

#[async_trait]
impl InventoryBackend for PostgresBackend {
    async fn new_item(&self, ctx: &CallContext, item: CreateItem) -> LedgerResult<Item> {
        ctx.run(self.insert_item(item)).await
    }

    async fn new_location(
        &self,
        ctx: &CallContext,
        location: CreateLocation,
    ) -> LedgerResult<Location> {
        ctx.run(self.insert_location(location)).await
    }

    async fn update_item(&self, ctx: &CallContext, item: Item) -> LedgerResult<Item> {
        ctx.run(self.replace_item(item)).await
    }

    async fn update_location(
        &self,
        ctx: &CallContext,
        location: Location,
    ) -> LedgerResult<Location> {
        ctx.run(self.replace_location(location)).await
    }

    async fn delete_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<()> {
        ctx.run(self.delete_by_id(Collection::Items, *id.as_uuid()))
            .await
    }

    async fn delete_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<()> {
        ctx.run(self.delete_by_id(Collection::Locations, *id.as_uuid()))
            .await
    }

    async fn get_item(&self, ctx: &CallContext, id: ItemId) -> LedgerResult<Item> {
        ctx.run(self.fetch_item(id)).await
    }

    async fn get_location(&self, ctx: &CallContext, id: LocationId) -> LedgerResult<Location> {
        ctx.run(self.fetch_location(id)).await
    }

    async fn get_inventory_transaction(
        &self,
        ctx: &CallContext,
        id: TransactionId,
    ) -> LedgerResult<InventoryTransaction> {
        ctx.run(self.fetch_transaction(id)).await
    }

    async fn list_items(&self, ctx: &CallContext) -> LedgerResult<Vec<Item>> {
        ctx.run(self.fetch_items()).await
    }

    async fn list_locations(&self, ctx: &CallContext) -> LedgerResult<Vec<Location>> {
        ctx.run(self.fetch_locations()).await
    }

    async fn list_inventory_transactions(
        &self,
        ctx: &CallContext,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        ctx.run(self.fetch_transactions(TransactionFilter::All))
            .await
    }

    async fn list_item_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<Inventory>> {
        ctx.run(self.fetch_inventories(InventoryFilter::Item(item_id)))
            .await
    }

    async fn list_location_inventory(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<Inventory>> {
        ctx.run(self.fetch_inventories(InventoryFilter::Location(location_id)))
            .await
    }

    async fn list_item_inventory_transactions(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        ctx.run(self.fetch_transactions(TransactionFilter::Item(item_id)))
            .await
    }

    async fn list_location_inventory_transactions(
        &self,
        ctx: &CallContext,
        location_id: LocationId,
    ) -> LedgerResult<Vec<InventoryTransaction>> {
        ctx.run(self.fetch_transactions(TransactionFilter::Location(location_id)))
            .await
    }

    async fn new_inventory_transaction(
        &self,
        ctx: &CallContext,
        txn: RecordTransaction,
    ) -> LedgerResult<InventoryTransaction> {
        ctx.run(self.record_transaction(txn)).await
    }

    async fn lookup_inventory(
        &self,
        ctx: &CallContext,
        item_id: ItemId,
        location_id: LocationId,
    ) -> LedgerResult<Inventory> {
        ctx.run(async {
            let inventory_ref = self.find_or_create_inventory(item_id, location_id).await?;
            self.read_inventory(inventory_ref).await
        })
        .await
    }

    async fn new_alert(&self, ctx: &CallContext, alert: RaiseAlert) -> LedgerResult<Alert> {
        ctx.run(self.insert_alert(alert)).await
    }

    async fn list_alerts(&self, ctx: &CallContext) -> LedgerResult<Vec<Alert>> {
        ctx.run(self.fetch_alerts()).await
    }

    async fn delete_alert(&self, ctx: &CallContext, id: AlertId) -> LedgerResult<()> {
        ctx.run(self.delete_by_id(Collection::Alerts, *id.as_uuid()))
            .await
    }
}

/// Map SQLx errors to the shared taxonomy.
fn map_sqlx_error(
    operation: &str,
    collection: Collection,
    id: impl ToString,
    err: sqlx::Error,
) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("40001") | Some("40P01") | Some("23505") => {
                let id = id.to_string();
                warn!(
                    operation,
                    collection = collection.as_str(),
                    id = %id,
                    "concurrent write conflict"
                );
                LedgerError::conflict(collection, id)
            }
            _ => LedgerError::store(
                operation,
                format!("database error: {}", db_err.message()),
            ),
        },
        sqlx::Error::RowNotFound => LedgerError::not_found(collection, id),
        other => LedgerError::store(operation, other),
    }
}

fn decode<'r, T>(row: &'r PgRow, operation: &str) -> LedgerResult<T>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row)
        .map_err(|e| LedgerError::store(operation, format!("failed to decode row: {e}")))
}

fn decode_all<'r, T, U>(rows: &'r [PgRow], operation: &str) -> LedgerResult<Vec<U>>
where
    T: FromRow<'r, PgRow> + Into<U>,
{
    rows.iter()
        .map(|row| decode::<T>(row, operation).map(Into::into))
        .collect()
}

struct ItemRow {
    id: Uuid,
    name: String,
    description: String,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: ItemId::from_uuid(row.id),
            name: row.name,
            description: row.description,
        }
    }
}

struct LocationRow {
    id: Uuid,
    name: String,
    warehouse: String,
}

impl<'r> FromRow<'r, PgRow> for LocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LocationRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            warehouse: row.try_get("warehouse")?,
        })
    }
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: LocationId::from_uuid(row.id),
            name: row.name,
            warehouse: row.warehouse,
        }
    }
}

struct InventoryRow {
    item_id: Uuid,
    location_id: Uuid,
    count: i64,
    last_updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InventoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            item_id: row.try_get("item_id")?,
            location_id: row.try_get("location_id")?,
            count: row.try_get("count")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

impl From<InventoryRow> for Inventory {
    fn from(row: InventoryRow) -> Self {
        Inventory {
            item_id: ItemId::from_uuid(row.item_id),
            location_id: LocationId::from_uuid(row.location_id),
            count: row.count,
            last_updated: row.last_updated,
        }
    }
}

struct TransactionRow {
    id: Uuid,
    item_id: Uuid,
    location_id: Uuid,
    action: String,
    count: i64,
    note: String,
    timestamp: DateTime<Utc>,
    created_by: String,
}

impl<'r> FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            location_id: row.try_get("location_id")?,
            action: row.try_get("action")?,
            count: row.try_get("count")?,
            note: row.try_get("note")?,
            timestamp: row.try_get("timestamp")?,
            created_by: row.try_get("created_by")?,
        })
    }
}

impl From<TransactionRow> for InventoryTransaction {
    fn from(row: TransactionRow) -> Self {
        InventoryTransaction {
            id: TransactionId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            location_id: LocationId::from_uuid(row.location_id),
            action: Action::from(row.action),
            count: row.count,
            note: row.note,
            timestamp: row.timestamp,
            created_by: row.created_by,
        }
    }
}

struct AlertRow {
    id: Uuid,
    item_id: Uuid,
    text: String,
    timestamp: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AlertRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AlertRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            text: row.try_get("text")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            id: AlertId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            text: row.text,
            timestamp: row.timestamp,
        }
    }
}
