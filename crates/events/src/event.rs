use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A fact that has already happened and can be handed to an [`EventBus`](crate::EventBus).
///
/// Events are immutable and versioned. `event_id` must be stable for the
/// lifetime of the fact so consumers can drop duplicate deliveries.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable identity of this occurrence.
    fn event_id(&self) -> Uuid;

    /// Stable event name/type identifier (e.g. "stockledger.InventoryTransaction").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
