use uuid::Uuid;

use super::error::{EventSourcingError, EventSourcingResult};
use super::event::{decode_recorded, DomainEvent, EventDraft, EventUpcaster, RecordedEvent};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. State is derived from events (not stored directly)
// 2. Commands are validated before emitting events
// 3. Events represent facts that have already happened
// 4. All state changes flow through events
//
// Command handling is two explicit steps: `handle_command` validates and
// returns the event, then `AggregateRoot` applies it and queues it for
// the repository.
//
// ============================================================================

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The closed event enum for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event: DomainEvent;
    type Command;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name recorded with every event, e.g. `"Reservation"`
    const AGGREGATE_TYPE: &'static str;

    /// Validate a creation command and synthesize the first event
    fn initialize(command: &Self::Command) -> Result<Self::Event, Self::Error>;

    /// Create new aggregate from first event
    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Validate a command against current state and synthesize exactly one event
    fn handle_command(&self, command: &Self::Command) -> Result<Self::Event, Self::Error>;
}

/// An aggregate together with its identity, version and unsaved events
#[derive(Debug, Clone)]
pub struct AggregateRoot<A: Aggregate> {
    id: Uuid,
    version: i64,
    state: A,
    pending: Vec<EventDraft>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Run a creation command against a fresh identity. The aggregate ends at
    /// version 1 with the creation event pending.
    pub fn create(aggregate_id: Uuid, command: &A::Command) -> EventSourcingResult<Self> {
        let event = A::initialize(command).map_err(EventSourcingError::invalid_transition)?;
        let draft = EventDraft::from_domain(A::AGGREGATE_TYPE, &event)?;
        let state = A::apply_first_event(aggregate_id, &event)
            .map_err(EventSourcingError::invalid_transition)?;

        Ok(Self {
            id: aggregate_id,
            version: 1,
            state,
            pending: vec![draft],
        })
    }

    /// Fold stored history into an aggregate
    pub fn from_history(
        aggregate_id: Uuid,
        events: &[RecordedEvent],
        upcasters: &[Box<dyn EventUpcaster>],
    ) -> EventSourcingResult<Self> {
        let (first, rest) = events
            .split_first()
            .ok_or(EventSourcingError::AggregateNotFound(aggregate_id))?;

        expect_version(aggregate_id, 1, first)?;
        let event: A::Event = decode_recorded(first, upcasters)?;
        let mut state = A::apply_first_event(aggregate_id, &event)
            .map_err(EventSourcingError::invalid_transition)?;
        let mut version = 1;

        for recorded in rest {
            expect_version(aggregate_id, version + 1, recorded)?;
            let event: A::Event = decode_recorded(recorded, upcasters)?;
            state
                .apply_event(&event)
                .map_err(EventSourcingError::invalid_transition)?;
            version += 1;
        }

        Ok(Self {
            id: aggregate_id,
            version,
            state,
            pending: Vec::new(),
        })
    }

    /// Handle a command: validate, apply, enqueue. Returns the queued draft.
    pub fn execute(&mut self, command: &A::Command) -> EventSourcingResult<&EventDraft> {
        let event = self
            .state
            .handle_command(command)
            .map_err(EventSourcingError::invalid_transition)?;
        let draft = EventDraft::from_domain(A::AGGREGATE_TYPE, &event)?;

        self.state
            .apply_event(&event)
            .map_err(EventSourcingError::invalid_transition)?;
        self.version += 1;
        self.pending.push(draft);

        Ok(&self.pending[self.pending.len() - 1])
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Version including pending events
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Version the store holds, i.e. before any pending events
    pub fn persisted_version(&self) -> i64 {
        self.version - self.pending.len() as i64
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    pub fn pending_events(&self) -> &[EventDraft] {
        &self.pending
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

fn expect_version(
    aggregate_id: Uuid,
    expected: i64,
    recorded: &RecordedEvent,
) -> EventSourcingResult<()> {
    if recorded.aggregate_version == expected {
        return Ok(());
    }

    tracing::error!(
        aggregate_id = %aggregate_id,
        expected,
        found = recorded.aggregate_version,
        "Stored history is not contiguous"
    );
    Err(EventSourcingError::CorruptHistory {
        aggregate_id,
        expected,
        found: recorded.aggregate_version,
    })
}
