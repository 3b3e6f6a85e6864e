use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::event_sourcing::core::{AggregateRoot, EventSourcingError, EventSourcingResult};
use crate::event_sourcing::notification_log::NotificationLog;
use crate::event_sourcing::repository::Repository;
use crate::event_sourcing::store::{self, EventStore};
use crate::utils::{retry_on_transient, RetryPolicy};

use super::aggregate::ReservationAggregate;
use super::commands::ReservationCommand;
use super::value_objects::SalonId;

// ============================================================================
// Reservation Application
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// One public method per business command, each doing exactly one
// load-mutate-save cycle. With a retry policy above one attempt, a
// conflicting cycle is rerun from a fresh load.
//
// ============================================================================

/// Read model returned by `get_reservation`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationView {
    pub client_name: String,
    pub salon_id: String,
    pub service: String,
    pub status: String,
}

impl ReservationView {
    fn from_aggregate(reservation: &ReservationAggregate) -> Self {
        Self {
            client_name: reservation.client_name.clone(),
            salon_id: reservation.salon_id.as_str().to_string(),
            service: reservation.service.clone(),
            status: reservation.status.to_string(),
        }
    }

    /// Plain key/value form for callers that don't want the struct
    pub fn into_map(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("client_name".to_string(), self.client_name),
            ("salon_id".to_string(), self.salon_id),
            ("service".to_string(), self.service),
            ("status".to_string(), self.status),
        ])
    }
}

pub struct ReservationApplication {
    repository: Repository<ReservationAggregate>,
    notification_log: NotificationLog,
    retry: RetryPolicy,
}

impl ReservationApplication {
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            repository: Repository::new(event_store.clone()),
            notification_log: NotificationLog::new(event_store),
            retry: RetryPolicy::none(),
        }
    }

    /// Build the configured store and wire the application to it
    pub async fn from_config(config: &AppConfig) -> EventSourcingResult<Self> {
        let event_store = store::connect(&config.persistence).await?;
        Ok(Self::with_store(event_store, config))
    }

    /// Wire an existing store using the paging and retry settings of `config`
    pub fn with_store(event_store: Arc<dyn EventStore>, config: &AppConfig) -> Self {
        Self {
            repository: Repository::new(event_store.clone()),
            notification_log: NotificationLog::with_max_page_size(
                event_store,
                config.notifications.max_page_size,
            ),
            retry: config.retry.policy(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn repository(&self) -> &Repository<ReservationAggregate> {
        &self.repository
    }

    pub fn notification_log(&self) -> &NotificationLog {
        &self.notification_log
    }

    /// Register a new reservation and return its id
    pub async fn create_reservation(
        &self,
        client_name: &str,
        salon_id: &str,
        service: &str,
    ) -> EventSourcingResult<Uuid> {
        let command = ReservationCommand::CreateReservation {
            client_name: client_name.to_string(),
            salon_id: SalonId::new(salon_id),
            service: service.to_string(),
        };

        let reservation_id = Uuid::now_v7();
        let mut reservation =
            AggregateRoot::<ReservationAggregate>::create(reservation_id, &command)?;
        self.repository.save(&mut reservation).await?;

        tracing::info!(
            reservation_id = %reservation_id,
            salon_id = %salon_id,
            "✅ Reservation created"
        );

        Ok(reservation_id)
    }

    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> EventSourcingResult<()> {
        self.cancel_reservation_with_reason(reservation_id, None).await
    }

    pub async fn cancel_reservation_with_reason(
        &self,
        reservation_id: Uuid,
        reason: Option<String>,
    ) -> EventSourcingResult<()> {
        self.execute(reservation_id, ReservationCommand::CancelReservation { reason })
            .await?;

        tracing::info!(reservation_id = %reservation_id, "✅ Reservation canceled");
        Ok(())
    }

    pub async fn complete_reservation(&self, reservation_id: Uuid) -> EventSourcingResult<()> {
        self.execute(reservation_id, ReservationCommand::CompleteReservation)
            .await?;

        tracing::info!(reservation_id = %reservation_id, "✅ Reservation completed");
        Ok(())
    }

    /// Load and project; never writes
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> EventSourcingResult<ReservationView> {
        let reservation = self.repository.load(reservation_id).await?;
        Ok(ReservationView::from_aggregate(reservation.state()))
    }

    async fn execute(
        &self,
        reservation_id: Uuid,
        command: ReservationCommand,
    ) -> EventSourcingResult<()> {
        let command = &command;

        retry_on_transient(&self.retry, move |attempt| {
            async move {
                let mut reservation = self.repository.load(reservation_id).await?;
                reservation.execute(command)?;
                self.repository.save(&mut reservation).await?;

                tracing::debug!(
                    reservation_id = %reservation_id,
                    attempt,
                    version = reservation.version(),
                    "Command applied"
                );
                Ok::<(), EventSourcingError>(())
            }
        })
        .await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{EventDraft, RecordedEvent};
    use crate::event_sourcing::store::InMemoryEventStore;
    use async_trait::async_trait;

    fn app() -> ReservationApplication {
        ReservationApplication::new(Arc::new(InMemoryEventStore::new()))
    }

    #[tokio::test]
    async fn test_reservation_lifecycle() {
        let app = app();

        let id = app
            .create_reservation("Eduardo Ramón", "salon_123", "Corte de cabello")
            .await
            .unwrap();
        app.complete_reservation(id).await.unwrap();

        let view = app.get_reservation(id).await.unwrap();
        assert_eq!(view.client_name, "Eduardo Ramón");
        assert_eq!(view.status, "Completed");

        app.cancel_reservation(id).await.unwrap();
        let view = app.get_reservation(id).await.unwrap();
        assert_eq!(view.status, "Canceled");

        let notifications = app.notification_log().select(1, 10).await.unwrap();
        assert_eq!(
            notifications.iter().map(|n| n.event_type.as_str()).collect::<Vec<_>>(),
            vec!["Created", "Completed", "Canceled"]
        );
    }

    #[tokio::test]
    async fn test_view_as_key_value_map() {
        let app = app();
        let id = app.create_reservation("Lucía", "salon_9", "Manicure").await.unwrap();

        let map = app.get_reservation(id).await.unwrap().into_map();
        assert_eq!(map["client_name"], "Lucía");
        assert_eq!(map["salon_id"], "salon_9");
        assert_eq!(map["service"], "Manicure");
        assert_eq!(map["status"], "Pending");
    }

    #[tokio::test]
    async fn test_unknown_reservation_is_not_found() {
        let app = app();
        let id = Uuid::now_v7();

        assert!(matches!(
            app.get_reservation(id).await,
            Err(EventSourcingError::AggregateNotFound(missing)) if missing == id
        ));
        assert!(matches!(
            app.complete_reservation(id).await,
            Err(EventSourcingError::AggregateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_command_writes_nothing() {
        let app = app();
        let id = app.create_reservation("Ana", "salon_1", "Tinte").await.unwrap();
        app.cancel_reservation(id).await.unwrap();

        let result = app.complete_reservation(id).await;
        assert!(matches!(result, Err(EventSourcingError::InvalidTransition(_))));

        let result = app.create_reservation("", "salon_1", "Tinte").await;
        assert!(matches!(result, Err(EventSourcingError::InvalidTransition(_))));

        assert_eq!(app.notification_log().max_sequence().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_reservation_does_not_write() {
        let app = app();
        let id = app.create_reservation("Ana", "salon_1", "Tinte").await.unwrap();

        app.get_reservation(id).await.unwrap();
        app.get_reservation(id).await.unwrap();

        assert_eq!(app.notification_log().max_sequence().await.unwrap(), 1);
    }

    /// Rejects the first `conflicts` appends after creation, then delegates
    struct ConflictingStore {
        inner: InMemoryEventStore,
        conflicts: parking_lot::Mutex<u32>,
    }

    #[async_trait]
    impl EventStore for ConflictingStore {
        async fn append(
            &self,
            aggregate_id: Uuid,
            expected_version: i64,
            drafts: Vec<EventDraft>,
        ) -> EventSourcingResult<Vec<RecordedEvent>> {
            if expected_version > 0 {
                let mut remaining = self.conflicts.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(EventSourcingError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual: expected_version + 1,
                    });
                }
            }
            self.inner.append(aggregate_id, expected_version, drafts).await
        }

        async fn read(
            &self,
            aggregate_id: Uuid,
            from_version: i64,
        ) -> EventSourcingResult<Vec<RecordedEvent>> {
            self.inner.read(aggregate_id, from_version).await
        }

        async fn read_notifications(
            &self,
            start: i64,
            limit: usize,
        ) -> EventSourcingResult<Vec<RecordedEvent>> {
            self.inner.read_notifications(start, limit).await
        }

        async fn current_version(&self, aggregate_id: Uuid) -> EventSourcingResult<i64> {
            self.inner.current_version(aggregate_id).await
        }

        async fn max_global_sequence(&self) -> EventSourcingResult<i64> {
            self.inner.max_global_sequence().await
        }
    }

    fn conflicting_app(conflicts: u32) -> ReservationApplication {
        ReservationApplication::new(Arc::new(ConflictingStore {
            inner: InMemoryEventStore::new(),
            conflicts: parking_lot::Mutex::new(conflicts),
        }))
    }

    #[tokio::test]
    async fn test_conflict_surfaces_without_retry_policy() {
        let app = conflicting_app(1);
        let id = app.create_reservation("Ana", "salon_1", "Tinte").await.unwrap();

        let result = app.complete_reservation(id).await;
        assert!(matches!(result, Err(EventSourcingError::ConcurrencyConflict { .. })));
        assert_eq!(app.get_reservation(id).await.unwrap().status, "Pending");
    }

    #[tokio::test]
    async fn test_retry_policy_reruns_conflicting_command() {
        let app = conflicting_app(2).with_retry(RetryPolicy::on_conflict(3));
        let id = app.create_reservation("Ana", "salon_1", "Tinte").await.unwrap();

        app.complete_reservation(id).await.unwrap();
        assert_eq!(app.get_reservation(id).await.unwrap().status, "Completed");
    }
}
