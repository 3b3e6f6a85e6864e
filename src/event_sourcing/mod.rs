// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/
//
// ============================================================================

// Core abstractions (GENERIC - works with any aggregate)
pub mod core;
pub mod store;

// Read/write paths built on the store
pub mod notification_log;
pub mod repository;

// Re-export core infrastructure
pub use self::core::*;
pub use notification_log::{NotificationLog, NotificationPage};
pub use repository::Repository;
pub use store::{EventStore, InMemoryEventStore, InstrumentedEventStore, SqliteEventStore};
