use super::value_objects::SalonId;

// ============================================================================
// Reservation Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum ReservationCommand {
    CreateReservation {
        client_name: String,
        salon_id: SalonId,
        service: String,
    },
    CancelReservation {
        reason: Option<String>,
    },
    CompleteReservation,
}
