//! `stockledger-core`: shared building blocks for the inventory ledger.
//!
//! This crate contains **pure** primitives (no storage, no IO): identifiers,
//! the entity/collection vocabulary and the error taxonomy that every storage
//! engine reports through.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Collection, Entity};
pub use error::{LedgerError, LedgerResult};
pub use id::{AlertId, ItemId, LocationId, TransactionId};
