use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::{EventSourcingError, EventSourcingResult};

// ============================================================================
// Event Records - Industry Standard Event Metadata
// ============================================================================
//
// An aggregate produces `EventDraft`s. The store turns each draft into a
// `RecordedEvent` by assigning its aggregate version and global sequence.
// Payloads travel as JSON so the store never needs to know domain types.
//
// ============================================================================

/// An event produced by an aggregate that has not been persisted yet
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventDraft {
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub schema_version: i32,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl EventDraft {
    pub fn new(
        aggregate_type: &str,
        event_type: &str,
        schema_version: i32,
        payload: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_type: aggregate_type.to_string(),
            event_type: event_type.to_string(),
            schema_version,
            payload,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Encode a domain event into a draft
    pub fn from_domain<E: DomainEvent>(
        aggregate_type: &str,
        event: &E,
    ) -> EventSourcingResult<Self> {
        let event_type = event.event_type();
        Ok(Self::new(
            aggregate_type,
            event_type,
            E::schema_version(event_type),
            event.payload()?,
        ))
    }

    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Stamp the draft with its position in the aggregate stream and the global log
    pub fn record(
        self,
        aggregate_id: Uuid,
        aggregate_version: i64,
        global_sequence: i64,
    ) -> RecordedEvent {
        RecordedEvent {
            global_sequence,
            event_id: self.event_id,
            aggregate_id,
            aggregate_type: self.aggregate_type,
            aggregate_version,
            event_type: self.event_type,
            schema_version: self.schema_version,
            payload: self.payload,
            timestamp: self.timestamp,
            metadata: self.metadata,
        }
    }
}

/// An immutable, persisted event
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    // Ordering
    pub global_sequence: i64,

    // Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_version: i64,

    // Type Information
    pub event_type: String,
    pub schema_version: i32,

    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// A closed set of events belonging to one aggregate type.
///
/// Implementors are enums with one variant per event type. `decode` must
/// match on the tag explicitly and reject anything it does not know.
pub trait DomainEvent: Sized + Clone + Send + Sync + 'static {
    /// Tag stored alongside the payload, e.g. `"Created"`
    fn event_type(&self) -> &'static str;

    /// Payload of the variant, without the tag
    fn payload(&self) -> EventSourcingResult<Value>;

    /// Rebuild the variant named by `event_type` from its payload
    fn decode(event_type: &str, payload: Value) -> EventSourcingResult<Self>;

    /// Payload schema version written by the current code
    fn schema_version(_event_type: &str) -> i32 {
        1
    }
}

// ============================================================================
// Event Versioning Support
// ============================================================================

/// Lifts a stored payload from an older schema version to the next one
pub trait EventUpcaster: Send + Sync {
    /// Whether this upcaster handles `event_type` stored at `from_version`
    fn can_upcast(&self, event_type: &str, from_version: i32) -> bool;

    /// Returns the payload at `from_version + 1`
    fn upcast(
        &self,
        event_type: &str,
        from_version: i32,
        payload: Value,
    ) -> EventSourcingResult<Value>;
}

/// Bring a recorded payload up to the version `E` expects, then decode it
pub fn decode_recorded<E: DomainEvent>(
    event: &RecordedEvent,
    upcasters: &[Box<dyn EventUpcaster>],
) -> EventSourcingResult<E> {
    let supported = E::schema_version(&event.event_type);
    let mut version = event.schema_version;
    let mut payload = event.payload.clone();

    if version > supported {
        return Err(EventSourcingError::UnsupportedSchemaVersion {
            event_type: event.event_type.clone(),
            found: version,
            supported,
        });
    }

    while version < supported {
        let upcaster = upcasters
            .iter()
            .find(|u| u.can_upcast(&event.event_type, version))
            .ok_or_else(|| EventSourcingError::UnsupportedSchemaVersion {
                event_type: event.event_type.clone(),
                found: version,
                supported,
            })?;
        payload = upcaster.upcast(&event.event_type, version, payload)?;
        version += 1;
    }

    E::decode(&event.event_type, payload)
}

// ============================================================================
// Tests
// ============================================================================
