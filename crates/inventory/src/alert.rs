use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{AlertId, Collection, Entity, ItemId};

use crate::clock;

/// A notice about an item's stock raised by a downstream monitor.
///
/// The ledger stores alerts; it never derives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub item_id: ItemId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Input for storing an alert; the engine assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseAlert {
    pub item_id: ItemId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl RaiseAlert {
    pub fn new(item_id: ItemId, text: impl Into<String>) -> Self {
        Self {
            item_id,
            text: text.into(),
            timestamp: clock::now(),
        }
    }

    /// Mint the stored alert. The timestamp is cut to ledger precision.
    pub fn with_id(self, id: AlertId) -> Alert {
        Alert {
            id,
            item_id: self.item_id,
            text: self.text,
            timestamp: clock::truncate(self.timestamp),
        }
    }
}

impl Entity for Alert {
    type Id = AlertId;
    const COLLECTION: Collection = Collection::Alerts;

    fn id(&self) -> AlertId {
        self.id
    }
}
