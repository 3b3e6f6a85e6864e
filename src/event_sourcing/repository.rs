use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{
    Aggregate, AggregateRoot, EventSourcingError, EventSourcingResult, EventUpcaster,
    RecordedEvent,
};
use crate::event_sourcing::store::EventStore;

// ============================================================================
// Generic Repository - Aggregates In, Events Out
// ============================================================================
//
// Bridges aggregates and the event store:
// 1. load: read history, upcast, fold
// 2. save: append pending events with the version seen at load time
//
// Conflicts are returned to the caller as-is. Retry policy belongs to the
// application layer.
//
// ============================================================================

pub struct Repository<A: Aggregate> {
    event_store: Arc<dyn EventStore>,
    upcasters: Vec<Box<dyn EventUpcaster>>,
    _phantom: PhantomData<fn() -> A>,
}

impl<A: Aggregate> Repository<A> {
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            upcasters: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Register an upcaster applied to stored payloads before decoding
    pub fn with_upcaster(mut self, upcaster: Box<dyn EventUpcaster>) -> Self {
        self.upcasters.push(upcaster);
        self
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    /// Reconstruct an aggregate from its full history
    pub async fn load(&self, aggregate_id: Uuid) -> EventSourcingResult<AggregateRoot<A>> {
        let events = self.event_store.read(aggregate_id, 1).await?;
        self.fold(aggregate_id, &events)
    }

    /// Reconstruct an aggregate as it was at `version`
    pub async fn load_at_version(
        &self,
        aggregate_id: Uuid,
        version: i64,
    ) -> EventSourcingResult<AggregateRoot<A>> {
        if version < 1 {
            return Err(EventSourcingError::AggregateNotFound(aggregate_id));
        }

        let mut events = self.event_store.read(aggregate_id, 1).await?;
        events.retain(|e| e.aggregate_version <= version);
        self.fold(aggregate_id, &events)
    }

    pub async fn exists(&self, aggregate_id: Uuid) -> EventSourcingResult<bool> {
        Ok(self.event_store.current_version(aggregate_id).await? > 0)
    }

    /// Persist pending events. Returns what was recorded; empty if nothing was pending.
    pub async fn save(
        &self,
        aggregate: &mut AggregateRoot<A>,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        if aggregate.pending_events().is_empty() {
            return Ok(Vec::new());
        }

        let aggregate_id = aggregate.id();
        let expected_version = aggregate.persisted_version();
        let drafts = aggregate.pending_events().to_vec();

        let recorded = self
            .event_store
            .append(aggregate_id, expected_version, drafts)
            .await?;
        aggregate.clear_pending();

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = A::AGGREGATE_TYPE,
            new_version = aggregate.version(),
            event_count = recorded.len(),
            "Saved aggregate"
        );

        Ok(recorded)
    }

    fn fold(
        &self,
        aggregate_id: Uuid,
        events: &[RecordedEvent],
    ) -> EventSourcingResult<AggregateRoot<A>> {
        let aggregate = AggregateRoot::from_history(aggregate_id, events, &self.upcasters)?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type = A::AGGREGATE_TYPE,
            version = aggregate.version(),
            "Loaded aggregate from events"
        );

        Ok(aggregate)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
