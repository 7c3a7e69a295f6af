//! Entity trait: identity + the collection an entity is stored in.

use serde::{Deserialize, Serialize};

/// Named collection of stored documents.
///
/// The names match the collection/table names used by the storage engines and
/// appear verbatim in `NotFound`/`Conflict` errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "items")]
    Items,
    #[serde(rename = "locations")]
    Locations,
    #[serde(rename = "inventories")]
    Inventories,
    #[serde(rename = "inventoryTransactions")]
    InventoryTransactions,
    #[serde(rename = "alerts")]
    Alerts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Locations => "locations",
            Collection::Inventories => "inventories",
            Collection::InventoryTransactions => "inventoryTransactions",
            Collection::Alerts => "alerts",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Collection the entity lives in.
    const COLLECTION: Collection;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
