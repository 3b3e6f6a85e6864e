// ============================================================================
// InStudio Events - Event-Sourced Persistence for Salon Reservations
// ============================================================================
//
// Layers, bottom-up:
// - event_sourcing: events, aggregates, stores, repository, notification log
// - domain: the Reservation aggregate and its application service
// - config / metrics / utils: ambient wiring
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod utils;

pub use config::AppConfig;
pub use domain::reservation::{ReservationApplication, ReservationView};
pub use event_sourcing::{
    EventSourcingError, EventSourcingResult, EventStore, NotificationLog, RecordedEvent, Repository,
};
