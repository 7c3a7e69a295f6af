use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Outbound message wrapping one event for delivery to subscribers.
///
/// The envelope id is the event's own id, so a redelivered message carries
/// the same id as the first delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    id: Uuid,
    source: String,
    #[serde(rename = "type")]
    event_type: String,
    version: u32,
    time: DateTime<Utc>,
    data: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        id: Uuid,
        source: impl Into<String>,
        event_type: impl Into<String>,
        version: u32,
        time: DateTime<Utc>,
        data: E,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            event_type: event_type.into(),
            version,
            time,
            data,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn data(&self) -> &E {
        &self.data
    }

    pub fn into_data(self) -> E {
        self.data
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, copying its identity and metadata into the envelope.
    pub fn from_event(source: impl Into<String>, event: &E) -> Self {
        Self::new(
            event.event_id(),
            source,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            event.clone(),
        )
    }
}

impl<E: Serialize> EventEnvelope<E> {
    /// Convert to the JSON-payload form carried by transport buses.
    pub fn to_json(&self) -> Result<EventEnvelope<serde_json::Value>, serde_json::Error> {
        let data = serde_json::to_value(&self.data)?;
        Ok(EventEnvelope {
            id: self.id,
            source: self.source.clone(),
            event_type: self.event_type.clone(),
            version: self.version,
            time: self.time,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Restocked {
        id: Uuid,
        qty: i64,
        at: DateTime<Utc>,
    }

    impl Event for Restocked {
        fn event_id(&self) -> Uuid {
            self.id
        }
        fn event_type(&self) -> &'static str {
            "test.Restocked"
        }
        fn version(&self) -> u32 {
            2
        }
        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_event_copies_identity_and_metadata() {
        let ev = Restocked {
            id: Uuid::now_v7(),
            qty: 7,
            at: Utc::now(),
        };

        let env = EventEnvelope::from_event("test.source", &ev);

        assert_eq!(env.id(), ev.id);
        assert_eq!(env.source(), "test.source");
        assert_eq!(env.event_type(), "test.Restocked");
        assert_eq!(env.version(), 2);
        assert_eq!(env.time(), ev.at);
        assert_eq!(env.data(), &ev);
    }

    #[test]
    fn json_form_uses_type_key() {
        let ev = Restocked {
            id: Uuid::now_v7(),
            qty: 3,
            at: Utc::now(),
        };
        let encoded = EventEnvelope::from_event("s", &ev).to_json().unwrap();
        let json = serde_json::to_value(encoded).unwrap();

        assert_eq!(json["type"], "test.Restocked");
        assert_eq!(json["data"]["qty"], 3);
        assert_eq!(json["id"], ev.id.to_string());
    }
}
