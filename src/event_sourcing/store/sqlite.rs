use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event_sourcing::core::{
    EventDraft, EventSourcingError, EventSourcingResult, RecordedEvent,
};
use super::EventStore;

// ============================================================================
// SQLite Event Store - File-Backed Persistence
// ============================================================================
//
// Responsibilities:
// 1. Append events to stored_events (append-only)
// 2. Load event history for aggregates
// 3. Ensure optimistic concurrency control
// 4. Serve the global notification order
//
// Every append runs in one BEGIN IMMEDIATE transaction, so it holds the
// database write lock from the version check to the commit. Writers in this
// process queue on `append_lock`; writers in other processes wait on the
// busy timeout. Global sequences are assigned as MAX + 1 without gaps.
// The UNIQUE constraint on (aggregate_id, aggregate_version) is the last
// line against a duplicate version and is the only constraint reported as
// a concurrency conflict.
//
// ============================================================================

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stored_events (
    global_sequence   INTEGER PRIMARY KEY,
    event_id          TEXT    NOT NULL UNIQUE,
    aggregate_id      TEXT    NOT NULL,
    aggregate_type    TEXT    NOT NULL,
    aggregate_version INTEGER NOT NULL,
    event_type        TEXT    NOT NULL,
    schema_version    INTEGER NOT NULL,
    payload           TEXT    NOT NULL,
    metadata          TEXT    NOT NULL,
    recorded_at       TEXT    NOT NULL,
    UNIQUE (aggregate_id, aggregate_version)
)";

/// How long a connection waits for another writer's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Constraint text SQLite reports when a stream version is taken twice
const VERSION_CONSTRAINT: &str = "stored_events.aggregate_id, stored_events.aggregate_version";

const SELECT_COLUMNS: &str = "SELECT global_sequence, event_id, aggregate_id, aggregate_type,
        aggregate_version, event_type, schema_version, payload, metadata, recorded_at
 FROM stored_events";

pub struct SqliteEventStore {
    pool: SqlitePool,
    append_lock: Mutex<()>,
}

impl SqliteEventStore {
    /// Open (or create) the database named `dbname`. `:memory:` gives a
    /// private in-memory database held by a single connection.
    pub async fn connect(dbname: &str, max_connections: u32) -> EventSourcingResult<Self> {
        let in_memory = dbname == ":memory:";

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new().filename(dbname).create_if_missing(true)
        };
        let options = options.busy_timeout(BUSY_TIMEOUT);

        let pool_options = if in_memory {
            // Every connection would see its own empty database otherwise.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the events table if needed
    pub async fn from_pool(pool: SqlitePool) -> EventSourcingResult<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;

        tracing::debug!("SQLite event store schema ready");

        Ok(Self {
            pool,
            append_lock: Mutex::new(()),
        })
    }

    fn to_event(row: &SqliteRow) -> EventSourcingResult<RecordedEvent> {
        let event_id: String = row.try_get("event_id")?;
        let aggregate_id: String = row.try_get("aggregate_id")?;
        let payload: String = row.try_get("payload")?;
        let metadata: String = row.try_get("metadata")?;
        let recorded_at: DateTime<Utc> = row.try_get("recorded_at")?;

        Ok(RecordedEvent {
            global_sequence: row.try_get("global_sequence")?,
            event_id: parse_uuid(&event_id)?,
            aggregate_id: parse_uuid(&aggregate_id)?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_version: row.try_get("aggregate_version")?,
            event_type: row.try_get("event_type")?,
            schema_version: row.try_get("schema_version")?,
            payload: serde_json::from_str(&payload)?,
            timestamp: recorded_at,
            metadata: serde_json::from_str::<HashMap<String, String>>(&metadata)?,
        })
    }
}

fn parse_uuid(value: &str) -> EventSourcingResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| EventSourcingError::StorageUnavailable(format!("corrupt uuid '{value}': {e}")))
}

/// True only when the insert lost the race for an aggregate version
fn is_version_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.message().contains(VERSION_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        drafts: Vec<EventDraft>,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let _guard = self.append_lock.lock().await;
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let current_version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(aggregate_version), 0) FROM stored_events WHERE aggregate_id = ?",
        )
        .bind(aggregate_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        if current_version != expected_version {
            tracing::warn!(
                aggregate_id = %aggregate_id,
                expected_version,
                current_version,
                "Concurrency conflict on append"
            );
            return Err(EventSourcingError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let max_sequence: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(global_sequence), 0) FROM stored_events")
                .fetch_one(&mut *tx)
                .await?;

        let mut recorded = Vec::with_capacity(drafts.len());

        for (offset, draft) in drafts.into_iter().enumerate() {
            let offset = offset as i64;
            let event = draft.record(
                aggregate_id,
                expected_version + 1 + offset,
                max_sequence + 1 + offset,
            );

            let payload = serde_json::to_string(&event.payload)?;
            let metadata = serde_json::to_string(&event.metadata)?;

            let inserted = sqlx::query(
                "INSERT INTO stored_events (
                    global_sequence, event_id, aggregate_id, aggregate_type, aggregate_version,
                    event_type, schema_version, payload, metadata, recorded_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(event.global_sequence)
            .bind(event.event_id.to_string())
            .bind(event.aggregate_id.to_string())
            .bind(&event.aggregate_type)
            .bind(event.aggregate_version)
            .bind(&event.event_type)
            .bind(event.schema_version)
            .bind(payload)
            .bind(metadata)
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => recorded.push(event),
                Err(e) if is_version_violation(&e) => {
                    return Err(EventSourcingError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual: event.aggregate_version,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            new_version = expected_version + recorded.len() as i64,
            event_count = recorded.len(),
            "✅ Appended events to SQLite store"
        );

        Ok(recorded)
    }

    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = ? AND aggregate_version >= ? ORDER BY aggregate_version ASC"
        ))
        .bind(aggregate_id.to_string())
        .bind(from_version)
        .fetch_all(&self.pool)
        .await?;

        let events = rows.iter().map(Self::to_event).collect::<EventSourcingResult<Vec<_>>>()?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            count = events.len(),
            "Loaded events for aggregate"
        );
        Ok(events)
    }

    async fn read_notifications(
        &self,
        start: i64,
        limit: usize,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE global_sequence >= ? ORDER BY global_sequence ASC LIMIT ?"
        ))
        .bind(start)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::to_event).collect()
    }

    async fn current_version(&self, aggregate_id: Uuid) -> EventSourcingResult<i64> {
        let version = sqlx::query_scalar(
            "SELECT COALESCE(MAX(aggregate_version), 0) FROM stored_events WHERE aggregate_id = ?",
        )
        .bind(aggregate_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn max_global_sequence(&self) -> EventSourcingResult<i64> {
        let sequence =
            sqlx::query_scalar("SELECT COALESCE(MAX(global_sequence), 0) FROM stored_events")
                .fetch_one(&self.pool)
                .await?;

        Ok(sequence)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn draft(event_type: &str) -> EventDraft {
        EventDraft::new("Test", event_type, 1, json!({ "kind": event_type }))
            .with_metadata("origin".to_string(), "unit-test".to_string())
    }

    async fn memory_store() -> SqliteEventStore {
        SqliteEventStore::connect(":memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_and_read_round_trip_columns() {
        let store = memory_store().await;
        let id = Uuid::new_v4();
        let original = draft("Created");

        let recorded = store.append(id, 0, vec![original.clone()]).await.unwrap();
        let loaded = store.read(id, 1).await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].event_id, original.event_id);
        assert_eq!(loaded[0].aggregate_version, 1);
        assert_eq!(loaded[0].global_sequence, 1);
        assert_eq!(loaded[0].payload, json!({ "kind": "Created" }));
        assert_eq!(loaded[0].metadata.get("origin").map(String::as_str), Some("unit-test"));
        assert_eq!(loaded[0].timestamp, recorded[0].timestamp);
    }

    #[tokio::test]
    async fn test_conflict_leaves_table_untouched() {
        let store = memory_store().await;
        let id = Uuid::new_v4();
        store.append(id, 0, vec![draft("Created")]).await.unwrap();

        let result = store.append(id, 0, vec![draft("Created"), draft("Renamed")]).await;

        assert!(matches!(result, Err(EventSourcingError::ConcurrencyConflict { actual: 1, .. })));
        assert_eq!(store.max_global_sequence().await.unwrap(), 1);
        assert_eq!(store.read(id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_whole_batch() {
        let store = memory_store().await;
        let id = Uuid::new_v4();
        let repeated = draft("Created");

        // Second draft reuses the first one's event_id
        let result = store.append(id, 0, vec![repeated.clone(), repeated]).await;

        assert!(matches!(result, Err(EventSourcingError::StorageUnavailable(_))));
        assert_eq!(store.max_global_sequence().await.unwrap(), 0);
        assert_eq!(store.current_version(id).await.unwrap(), 0);
        assert!(store.read(id, 1).await.unwrap().is_empty());

        let recorded = store.append(id, 0, vec![draft("Created")]).await.unwrap();
        assert_eq!(recorded[0].global_sequence, 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_id_is_not_a_conflict() {
        let store = memory_store().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let shared = draft("Created");
        store.append(a, 0, vec![shared.clone()]).await.unwrap();

        let result = store.append(b, 0, vec![shared]).await;

        assert!(matches!(result, Err(EventSourcingError::StorageUnavailable(_))));
        assert_eq!(store.current_version(b).await.unwrap(), 0);
        assert_eq!(store.max_global_sequence().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_global_sequence_spans_aggregates() {
        let store = memory_store().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.append(a, 0, vec![draft("Created")]).await.unwrap();
        store.append(b, 0, vec![draft("Created"), draft("Renamed")]).await.unwrap();
        store.append(a, 1, vec![draft("Closed")]).await.unwrap();

        let all = store.read_notifications(1, 10).await.unwrap();
        assert_eq!(all.iter().map(|e| e.global_sequence).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(all[3].aggregate_id, a);
        assert_eq!(all[3].aggregate_version, 2);

        assert_eq!(store.read_notifications(3, 1).await.unwrap()[0].global_sequence, 3);
        assert!(store.read_notifications(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let dbname = path.to_str().unwrap();
        let id = Uuid::new_v4();

        {
            let store = SqliteEventStore::connect(dbname, 2).await.unwrap();
            store.append(id, 0, vec![draft("Created"), draft("Renamed")]).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteEventStore::connect(dbname, 2).await.unwrap();
        assert_eq!(reopened.current_version(id).await.unwrap(), 2);
        assert_eq!(reopened.max_global_sequence().await.unwrap(), 2);

        let next = reopened.append(id, 2, vec![draft("Closed")]).await.unwrap();
        assert_eq!(next[0].global_sequence, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_same_version_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let store = Arc::new(SqliteEventStore::connect(path.to_str().unwrap(), 4).await.unwrap());
        let id = Uuid::new_v4();
        store.append(id, 0, vec![draft("Created")]).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.append(id, 1, vec![draft("Renamed")]).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(e.is_concurrency_conflict(), "unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.current_version(id).await.unwrap(), 2);
    }

    async fn shared_file_stores(
        dir: &tempfile::TempDir,
    ) -> (Arc<SqliteEventStore>, Arc<SqliteEventStore>) {
        let path = dir.path().join("shared.db");
        let dbname = path.to_str().unwrap();
        let first = SqliteEventStore::connect(dbname, 2).await.unwrap();
        let second = SqliteEventStore::connect(dbname, 2).await.unwrap();
        (Arc::new(first), Arc::new(second))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_stores_on_one_file_append_fresh_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = shared_file_stores(&dir).await;

        let handles: Vec<_> = (0..30)
            .flat_map(|_| [first.clone(), second.clone()])
            .map(|store| {
                tokio::spawn(async move {
                    store.append(Uuid::new_v4(), 0, vec![draft("Created")]).await
                })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "append on a fresh aggregate failed: {:?}", result.err());
        }

        let all = first.read_notifications(1, 100).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.global_sequence).collect::<Vec<_>>(),
            (1..=60).collect::<Vec<i64>>()
        );
        assert_eq!(second.max_global_sequence().await.unwrap(), 60);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_stores_same_version_race_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let (first, second) = shared_file_stores(&dir).await;

        for _ in 0..10 {
            let id = Uuid::new_v4();
            first.append(id, 0, vec![draft("Created")]).await.unwrap();

            let a = {
                let store = first.clone();
                tokio::spawn(async move { store.append(id, 1, vec![draft("Renamed")]).await })
            };
            let b = {
                let store = second.clone();
                tokio::spawn(async move { store.append(id, 1, vec![draft("Renamed")]).await })
            };

            let outcomes = [a.await.unwrap(), b.await.unwrap()];
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
            for outcome in &outcomes {
                if let Err(e) = outcome {
                    assert!(e.is_concurrency_conflict(), "unexpected error: {e}");
                }
            }
            assert_eq!(second.current_version(id).await.unwrap(), 2);
        }
    }
}
