use serde::{Deserialize, Serialize};

use stockledger_core::{Collection, Entity, ItemId, LocationId};

/// A stock-keeping unit. `name` is required, but that is enforced by the
/// request-validation layer, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Input for creating an item; the engine assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateItem {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn with_id(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            description: self.description,
        }
    }
}

impl Entity for Item {
    type Id = ItemId;
    const COLLECTION: Collection = Collection::Items;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// A place stock is kept, grouped by warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub warehouse: String,
}

/// Input for creating a location; the engine assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateLocation {
    pub name: String,
    pub warehouse: String,
}

impl CreateLocation {
    pub fn new(name: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            warehouse: warehouse.into(),
        }
    }

    pub fn with_id(self, id: LocationId) -> Location {
        Location {
            id,
            name: self.name,
            warehouse: self.warehouse,
        }
    }
}

impl Entity for Location {
    type Id = LocationId;
    const COLLECTION: Collection = Collection::Locations;

    fn id(&self) -> LocationId {
        self.id
    }
}
