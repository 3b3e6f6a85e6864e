use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::event_sourcing::core::{
    EventDraft, EventSourcingError, EventSourcingResult, RecordedEvent,
};
use crate::metrics::EventStoreMetrics;
use super::EventStore;

/// Wraps any store and records Prometheus metrics for every call
pub struct InstrumentedEventStore {
    inner: Arc<dyn EventStore>,
    metrics: Arc<EventStoreMetrics>,
}

impl InstrumentedEventStore {
    pub fn new(inner: Arc<dyn EventStore>, metrics: Arc<EventStoreMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &Arc<EventStoreMetrics> {
        &self.metrics
    }

    fn observe_failure(&self, operation: &str, error: &EventSourcingError) {
        if let EventSourcingError::StorageUnavailable(reason) = error {
            tracing::error!(operation, reason = %reason, "Event store backend failure");
            self.metrics.storage_failures.with_label_values(&[operation]).inc();
        }
    }
}

#[async_trait]
impl EventStore for InstrumentedEventStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        drafts: Vec<EventDraft>,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let aggregate_type = drafts
            .first()
            .map(|d| d.aggregate_type.clone())
            .unwrap_or_default();
        let started = Instant::now();

        let result = self.inner.append(aggregate_id, expected_version, drafts).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(recorded) => {
                self.metrics.append_duration.with_label_values(&["ok"]).observe(elapsed);
                self.metrics
                    .events_appended
                    .with_label_values(&[aggregate_type.as_str()])
                    .inc_by(recorded.len() as u64);
                if let Some(last) = recorded.last() {
                    self.metrics.global_sequence.set(last.global_sequence);
                }
            }
            Err(error) => {
                self.metrics.append_duration.with_label_values(&["error"]).observe(elapsed);
                if error.is_concurrency_conflict() {
                    self.metrics
                        .concurrency_conflicts
                        .with_label_values(&[aggregate_type.as_str()])
                        .inc();
                }
                self.observe_failure("append", error);
            }
        }

        result
    }

    async fn read(
        &self,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let result = self.inner.read(aggregate_id, from_version).await;
        match &result {
            Ok(events) => self
                .metrics
                .events_read
                .with_label_values(&["aggregate"])
                .inc_by(events.len() as u64),
            Err(error) => self.observe_failure("read", error),
        }
        result
    }

    async fn read_notifications(
        &self,
        start: i64,
        limit: usize,
    ) -> EventSourcingResult<Vec<RecordedEvent>> {
        let result = self.inner.read_notifications(start, limit).await;
        match &result {
            Ok(events) => self
                .metrics
                .events_read
                .with_label_values(&["notifications"])
                .inc_by(events.len() as u64),
            Err(error) => self.observe_failure("read_notifications", error),
        }
        result
    }

    async fn current_version(&self, aggregate_id: Uuid) -> EventSourcingResult<i64> {
        let result = self.inner.current_version(aggregate_id).await;
        if let Err(error) = &result {
            self.observe_failure("current_version", error);
        }
        result
    }

    async fn max_global_sequence(&self) -> EventSourcingResult<i64> {
        let result = self.inner.max_global_sequence().await;
        if let Err(error) = &result {
            self.observe_failure("max_global_sequence", error);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::store::InMemoryEventStore;
    use serde_json::json;

    fn draft() -> EventDraft {
        EventDraft::new("Reservation", "Created", 1, json!({}))
    }

    #[tokio::test]
    async fn test_counts_appends_and_conflicts() {
        let metrics = Arc::new(EventStoreMetrics::new().unwrap());
        let store =
            InstrumentedEventStore::new(Arc::new(InMemoryEventStore::new()), metrics.clone());
        let id = Uuid::new_v4();

        store.append(id, 0, vec![draft(), draft()]).await.unwrap();
        let conflict = store.append(id, 0, vec![draft()]).await;
        assert!(conflict.is_err());

        assert_eq!(metrics.events_appended.with_label_values(&["Reservation"]).get(), 2);
        assert_eq!(metrics.concurrency_conflicts.with_label_values(&["Reservation"]).get(), 1);
        assert_eq!(metrics.global_sequence.get(), 2);
    }

    #[tokio::test]
    async fn test_counts_events_read() {
        let metrics = Arc::new(EventStoreMetrics::new().unwrap());
        let store =
            InstrumentedEventStore::new(Arc::new(InMemoryEventStore::new()), metrics.clone());
        let id = Uuid::new_v4();
        store.append(id, 0, vec![draft(), draft(), draft()]).await.unwrap();

        store.read(id, 2).await.unwrap();
        store.read_notifications(1, 10).await.unwrap();

        assert_eq!(metrics.events_read.with_label_values(&["aggregate"]).get(), 2);
        assert_eq!(metrics.events_read.with_label_values(&["notifications"]).get(), 3);
    }
}
