//! Infrastructure layer: storage engines, event bus transports, config.

pub mod config;
pub mod event_bus;
pub mod ledger;


pub use config::{BackendKind, ConfigError, LedgerConfig, connect};
pub use ledger::{
    CallContext, CancelHandle, InMemoryBackend, InMemoryLedger, InventoryBackend,
    PostgresBackend, PublishingBackend,
};
