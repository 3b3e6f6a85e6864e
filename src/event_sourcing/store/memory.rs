use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{
    EventDraft, EventSourcingError, EventSourcingResult, RecordedEvent,
};
use super::EventStore;

// ============================================================================
// In-Memory Event Store
// ============================================================================
//
// Locking:
// - each aggregate stream has its own mutex, held for the whole
//   check-version-and-assign step
// - the global log has one RwLock, write-held only while a batch is
//   numbered and pushed, so global sequences become visible in order
//
// Appends to unrelated aggregates only contend on the short log push.
//
// ============================================================================

/// Positions (global sequences) of one aggregate's events, in version order
type Stream = Arc<Mutex<Vec<i64>>>;

#[derive(Default)]
pub struct InMemoryEventStore {
    streams: DashMap<Uuid, Stream>,
    log: RwLock<Vec<RecordedEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&self, aggregate_id: Uuid) -> Stream {
        // Clone the Arc so the DashMap shard lock is released before we
        // take the stream mutex.
        self.streams.entry(aggregate_id).or_default().value().clone()
    }

    fn existing_stream(&self, aggregate_id: Uuid) -> Option<Stream> {
        self.streams.get(&aggregate_id).map(|entry| entry.value().clone())
    }
}

fn check_version(
    aggregate_id: Uuid,
    expected_version: i64,
    current_version: i64,
) -> EventSourcingResult<()> {
    if current_version == expected_version {
        return Ok(());
    }

    tracing::warn!(
        aggregate_id = %aggregate_id,
        expected_version,
        current_version,
        "Concurrency conflict on append"
    );
    Err(EventSourcingError::ConcurrencyConflict {
        aggregate_id,
        expected: expected_version,
        actual: current_version,
    })
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        drafts: Vec<EventDraft>,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        // Only an append that will write at version 0 may open a new stream
        let stream = if expected_version == 0 && !drafts.is_empty() {
            Some(self.stream(aggregate_id))
        } else {
            self.existing_stream(aggregate_id)
        };

        let Some(stream) = stream else {
            check_version(aggregate_id, expected_version, 0)?;
            return Ok(Vec::new());
        };
        let mut positions = stream.lock();

        check_version(aggregate_id, expected_version, positions.len() as i64)?;

        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let recorded = {
            let mut log = self.log.write();
            let first_sequence = log.len() as i64 + 1;

            let recorded: Vec<RecordedEvent> = drafts
                .into_iter()
                .enumerate()
                .map(|(offset, draft)| {
                    let offset = offset as i64;
                    draft.record(
                        aggregate_id,
                        expected_version + 1 + offset,
                        first_sequence + offset,
                    )
                })
                .collect();

            log.extend(recorded.iter().cloned());
            recorded
        };

        positions.extend(recorded.iter().map(|e| e.global_sequence));

        tracing::info!(
            aggregate_id = %aggregate_id,
            new_version = positions.len(),
            event_count = recorded.len(),
            "✅ Appended events to in-memory store"
        );

        Ok(recorded)
    }

    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let Some(stream) = self.existing_stream(aggregate_id) else {
            return Ok(Vec::new());
        };

        let skip = (from_version.max(1) - 1) as usize;
        let positions: Vec<i64> = stream.lock().iter().skip(skip).copied().collect();

        let log = self.log.read();
        let events = positions
            .into_iter()
            .map(|sequence| log[(sequence - 1) as usize].clone())
            .collect();

        Ok(events)
    }

    async fn read_notifications(
        &self,
        start: i64,
        limit: usize,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let log = self.log.read();
        let skip = (start.max(1) - 1) as usize;

        Ok(log.iter().skip(skip).take(limit).cloned().collect())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> EventSourcingResult<i64> {
        Ok(self
            .existing_stream(aggregate_id)
            .map(|stream| stream.lock().len() as i64)
            .unwrap_or(0))
    }

    async fn max_global_sequence(&self) -> EventSourcingResult<i64> {
        Ok(self.log.read().len() as i64)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
