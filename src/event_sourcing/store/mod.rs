// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================
//
// This module contains GENERIC persistence infrastructure for event sourcing.
// Backends store JSON payloads and never see domain types.
//
// ============================================================================

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{PersistenceConfig, PersistenceModule};
use crate::event_sourcing::core::{EventDraft, EventSourcingResult, RecordedEvent};

pub mod instrumented;
pub mod memory;
pub mod sqlite;

pub use instrumented::InstrumentedEventStore;
pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;

/// Append-only event log keyed by aggregate identity.
///
/// Implementations must make `append` atomic (all drafts or none), check the
/// expected version and assign aggregate versions under one per-aggregate
/// critical section, and publish global sequences in order, so a reader of
/// `read_notifications` never sees sequence `n + 1` before `n`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append drafts if the aggregate's stored version equals `expected_version`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if another writer got there first
    /// - `StorageUnavailable` if the backend failed; nothing was written
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        drafts: Vec<EventDraft>,
    ) -> EventSourcingResult<Vec<RecordedEvent>>;

    /// Events of one aggregate with `aggregate_version >= from_version`, ascending
    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> EventSourcingResult<Vec<RecordedEvent>>;

    /// Up to `limit` events with `global_sequence >= start`, ascending
    async fn read_notifications(
        &self,
        start: i64,
        limit: usize,
    ) -> EventSourcingResult<Vec<RecordedEvent>>;

    /// Highest stored version of an aggregate, 0 if it has no events
    async fn current_version(&self, aggregate_id: Uuid) -> EventSourcingResult<i64>;

    /// Highest assigned global sequence, 0 for an empty store
    async fn max_global_sequence(&self) -> EventSourcingResult<i64>;
}

/// Build the backend named by the persistence configuration
pub async fn connect(config: &PersistenceConfig) -> EventSourcingResult<Arc<dyn EventStore>> {
    match config.module {
        PersistenceModule::Memory => {
            tracing::info!("Using in-memory event store");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
        PersistenceModule::Sqlite => {
            tracing::info!(dbname = %config.sqlite_dbname, "Using SQLite event store");
            let store =
                SqliteEventStore::connect(&config.sqlite_dbname, config.max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}
