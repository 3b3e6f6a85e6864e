// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// This module contains GENERIC, reusable event sourcing infrastructure
// that works with ANY domain aggregate.
//
// Key Principles:
// - No domain-specific code (no Reservation, Salon, etc.)
// - Generic over aggregate types
// - Reusable across all aggregates
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;

// Re-export core types for convenience
pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{EventSourcingError, EventSourcingResult};
pub use event::{decode_recorded, DomainEvent, EventDraft, EventUpcaster, RecordedEvent};
