//! Inventory ledger entity model.
//!
//! Plain data plus the one mutation rule shared by every engine
//! ([`Inventory::apply_transaction`]). No IO, no storage.

pub mod alert;
pub mod catalog;
pub mod clock;
pub mod inventory;
pub mod transaction;

pub use alert::{Alert, RaiseAlert};
pub use catalog::{CreateItem, CreateLocation, Item, Location};
pub use inventory::{Inventory, balance_from_history};
pub use transaction::{Action, InventoryTransaction, RecordTransaction};

/// Source identifier stamped on every event the ledger publishes.
pub const EVENT_SOURCE: &str = "stockledger.ledger";

/// Type identifier of the event published for each committed transaction.
pub const TRANSACTION_EVENT_TYPE: &str = "stockledger.InventoryTransaction";
