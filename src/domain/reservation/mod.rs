// ============================================================================
// Reservation Domain - Business Logic for Salon Reservations
// ============================================================================
//
// This module contains ALL Reservation-specific code:
// - Value objects (SalonId, ReservationStatus)
// - Events (Created, Canceled, Completed)
// - Commands (CreateReservation, CancelReservation, CompleteReservation)
// - Errors (ReservationError enum)
// - Aggregate (ReservationAggregate with business logic)
// - Application (ReservationApplication command/query surface)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod application;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use application::*;
