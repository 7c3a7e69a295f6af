//! Ledger error taxonomy.
//!
//! Shared by every storage engine so the backend contract is interchangeable:
//! callers cannot tell from an error which engine produced it.

use thiserror::Error;

use crate::entity::Collection;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// `NotFound` is the only kind expected under correct use. `Conflict` and
/// `InternalInconsistency` are operational signals. None of them are retried
/// inside the ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The referenced item, location, transaction or alert does not exist.
    #[error("resource {id:?} not found in collection {:?}", .collection.as_str())]
    NotFound { collection: Collection, id: String },

    /// A concurrent mutation collided with this one (remote engine only).
    #[error(
        "concurrent transaction ongoing conflicting with resource {id:?} in collection {:?}",
        .collection.as_str()
    )]
    Conflict { collection: Collection, id: String },

    /// The transaction's action is not one of ADD, REMOVE, RECOUNT.
    #[error("unknown action: {0}")]
    InvalidAction(String),

    /// A system-level invariant was found violated (duplicate balance record,
    /// diverging indices). The call aborts; nothing is repaired.
    #[error("inventory data inconsistent: {0}")]
    InternalInconsistency(String),

    /// The call's cancellation signal fired or its deadline elapsed.
    #[error("call cancelled: {reason}")]
    Cancelled { reason: String },

    /// Transport, driver or decoding failure reported by the remote store.
    #[error("store error during {operation}: {message}")]
    Store { operation: String, message: String },

    /// The transaction committed but publishing its event failed.
    #[error("transaction {transaction_id} committed but event publication failed: {message}")]
    Publish {
        transaction_id: String,
        message: String,
    },
}

impl LedgerError {
    pub fn not_found(collection: Collection, id: impl ToString) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    pub fn item_not_found(id: impl ToString) -> Self {
        Self::not_found(Collection::Items, id)
    }

    pub fn location_not_found(id: impl ToString) -> Self {
        Self::not_found(Collection::Locations, id)
    }

    pub fn transaction_not_found(id: impl ToString) -> Self {
        Self::not_found(Collection::InventoryTransactions, id)
    }

    pub fn alert_not_found(id: impl ToString) -> Self {
        Self::not_found(Collection::Alerts, id)
    }

    pub fn conflict(collection: Collection, id: impl ToString) -> Self {
        Self::Conflict {
            collection,
            id: id.to_string(),
        }
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::InternalInconsistency(msg.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn store(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the caller may retry: after fixing a reference (`NotFound`) or
    /// after backing off (`Conflict`).
    pub fn is_retryable(&self) -> bool {
        self.is_not_found() || self.is_conflict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_id_and_collection() {
        let err = LedgerError::item_not_found("abc");
        assert_eq!(
            err.to_string(),
            r#"resource "abc" not found in collection "items""#
        );
    }

    #[test]
    fn conflict_message_names_id_and_collection() {
        let err = LedgerError::conflict(Collection::Inventories, "inv-1");
        assert_eq!(
            err.to_string(),
            r#"concurrent transaction ongoing conflicting with resource "inv-1" in collection "inventories""#
        );
    }

    #[test]
    fn only_not_found_and_conflict_are_retryable() {
        assert!(LedgerError::location_not_found("x").is_retryable());
        assert!(LedgerError::conflict(Collection::Inventories, "x").is_retryable());
        assert!(!LedgerError::InvalidAction("MOVE".into()).is_retryable());
        assert!(!LedgerError::inconsistent("two records").is_retryable());
        assert!(!LedgerError::cancelled("deadline").is_retryable());
    }

    #[test]
    fn transaction_not_found_uses_log_collection() {
        match LedgerError::transaction_not_found("t") {
            LedgerError::NotFound { collection, id } => {
                assert_eq!(collection, Collection::InventoryTransactions);
                assert_eq!(id, "t");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
