use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{Collection, Entity, ItemId, LocationId, TransactionId};
use stockledger_events::Event;

use crate::TRANSACTION_EVENT_TYPE;
use crate::clock;

/// Kind of stock movement.
///
/// The set is closed; anything else decodes into [`Action::Unknown`] so the
/// ledger can reject it with `InvalidAction` instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Stock received: the balance grows by the count.
    Add,
    /// Stock taken out: the balance shrinks by the count (may go negative).
    Remove,
    /// Physical count: the balance becomes the count.
    Recount,
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Add => "ADD",
            Action::Remove => "REMOVE",
            Action::Recount => "RECOUNT",
            Action::Unknown(other) => other,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Action::Unknown(_))
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ADD" => Action::Add,
            "REMOVE" => Action::Remove,
            "RECOUNT" => Action::Recount,
            _ => Action::Unknown(value),
        }
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        Action::from(value.to_string())
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        match value {
            Action::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One permanent entry of the transaction log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub action: Action,
    pub count: i64,
    #[serde(default)]
    pub note: String,
    /// Moment the movement was applied to the balance.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
}

/// Input for recording a stock movement. Id and timestamp are assigned by the
/// engine when the movement is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTransaction {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub action: Action,
    pub count: i64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub created_by: String,
}

impl RecordTransaction {
    pub fn new(item_id: ItemId, location_id: LocationId, action: Action, count: i64) -> Self {
        Self {
            item_id,
            location_id,
            action,
            count,
            note: String::new(),
            created_by: String::new(),
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.created_by = who.into();
        self
    }

    /// Turn the request into a log entry with the given id.
    ///
    /// The timestamp is provisional until
    /// [`Inventory::apply_transaction`](crate::Inventory::apply_transaction)
    /// stamps the moment of application.
    pub fn into_transaction(self, id: TransactionId) -> InventoryTransaction {
        InventoryTransaction {
            id,
            item_id: self.item_id,
            location_id: self.location_id,
            action: self.action,
            count: self.count,
            note: self.note,
            timestamp: clock::now(),
            created_by: self.created_by,
        }
    }
}

impl Entity for InventoryTransaction {
    type Id = TransactionId;
    const COLLECTION: Collection = Collection::InventoryTransactions;

    fn id(&self) -> TransactionId {
        self.id
    }
}

impl Event for InventoryTransaction {
    fn event_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn event_type(&self) -> &'static str {
        TRANSACTION_EVENT_TYPE
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_actions_decode_from_wire_names() {
        assert_eq!(Action::from("ADD"), Action::Add);
        assert_eq!(Action::from("REMOVE"), Action::Remove);
        assert_eq!(Action::from("RECOUNT"), Action::Recount);
    }

    #[test]
    fn unrecognised_action_is_kept_verbatim() {
        let action = Action::from("add");
        assert_eq!(action, Action::Unknown("add".to_string()));
        assert!(!action.is_known());
        assert_eq!(action.to_string(), "add");
    }

    #[test]
    fn transaction_serializes_with_camel_case_fields() {
        let txn = RecordTransaction::new(ItemId::new(), LocationId::new(), Action::Remove, 3)
            .note("damaged")
            .created_by("clerk")
            .into_transaction(TransactionId::new());

        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["action"], "REMOVE");
        assert_eq!(json["itemId"], txn.item_id.to_string());
        assert_eq!(json["createdBy"], "clerk");

        let back: InventoryTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, txn);
    }

    #[test]
    fn event_id_is_the_transaction_id() {
        let txn = RecordTransaction::new(ItemId::new(), LocationId::new(), Action::Add, 1)
            .into_transaction(TransactionId::new());
        assert_eq!(txn.event_id(), *txn.id.as_uuid());
        assert_eq!(txn.event_type(), TRANSACTION_EVENT_TYPE);
    }
}
