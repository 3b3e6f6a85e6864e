use super::value_objects::ReservationStatus;

// ============================================================================
// Reservation Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Reservation is already canceled")]
    AlreadyCanceled,

    #[error("Reservation is already completed")]
    AlreadyCompleted,

    #[error("Cannot {action} reservation in status: {status}")]
    InvalidStatusTransition {
        action: &'static str,
        status: ReservationStatus,
    },

    #[error("Client name cannot be empty")]
    EmptyClientName,

    #[error("Salon id cannot be empty")]
    EmptySalonId,

    #[error("Service cannot be empty")]
    EmptyService,

    #[error("Reservation already exists")]
    AlreadyCreated,

    #[error("Aggregate not initialized")]
    NotInitialized,
}
