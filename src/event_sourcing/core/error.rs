use uuid::Uuid;

// ============================================================================
// Event Sourcing Errors
// ============================================================================
//
// One taxonomy shared by the store, the repository and the application layer.
// Domain rule violations arrive wrapped in `InvalidTransition`; everything
// else originates in the infrastructure.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventSourcingError {
    /// The stored version moved on since the aggregate was loaded.
    #[error("Concurrency conflict on aggregate {aggregate_id}: expected version {expected}, but current is {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Domain policy rejected the command. No event was produced.
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Unknown event type '{event_type}' for aggregate type {aggregate_type}")]
    UnknownEventType {
        aggregate_type: &'static str,
        event_type: String,
    },

    #[error("Unsupported schema version {found} for event '{event_type}' (current is {supported})")]
    UnsupportedSchemaVersion {
        event_type: String,
        found: i32,
        supported: i32,
    },

    /// Stored versions of one aggregate do not run 1, 2, 3, ... without gaps.
    #[error("Corrupt history for aggregate {aggregate_id}: expected version {expected}, found {found}")]
    CorruptHistory {
        aggregate_id: Uuid,
        expected: i64,
        found: i64,
    },

    #[error("Event payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure. Nothing from the failed call was committed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type EventSourcingResult<T> = Result<T, EventSourcingError>;

impl EventSourcingError {
    pub fn invalid_transition<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InvalidTransition(Box::new(error))
    }

    pub fn storage<E: std::fmt::Display>(error: E) -> Self {
        Self::StorageUnavailable(error.to_string())
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Conflicts are transient. Storage failures go back to the caller.
impl crate::utils::IsTransient for EventSourcingError {
    fn is_transient(&self) -> bool {
        self.is_concurrency_conflict()
    }
}

impl From<sqlx::Error> for EventSourcingError {
    fn from(error: sqlx::Error) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("already done")]
    struct AlreadyDone;

    #[test]
    fn test_invalid_transition_keeps_domain_error_as_source() {
        let error = EventSourcingError::invalid_transition(AlreadyDone);
        assert_eq!(error.to_string(), "Invalid transition: already done");

        let source = std::error::Error::source(&error).unwrap();
        assert!(source.downcast_ref::<AlreadyDone>().is_some());
    }

    #[test]
    fn test_conflict_message_names_both_versions() {
        let aggregate_id = Uuid::new_v4();
        let error = EventSourcingError::ConcurrencyConflict {
            aggregate_id,
            expected: 2,
            actual: 3,
        };

        assert!(error.is_concurrency_conflict());
        let message = error.to_string();
        assert!(message.contains("expected version 2"));
        assert!(message.contains("current is 3"));
    }
}
