use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event_sourcing::core::{DomainEvent, EventSourcingError, EventSourcingResult};
use super::value_objects::SalonId;

// ============================================================================
// Reservation Events - Domain Events for Reservation Aggregate
// ============================================================================

/// Reservation Event - closed set of everything a reservation can record
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationEvent {
    Created(ReservationCreated),
    Canceled(ReservationCanceled),
    Completed(ReservationCompleted),
}

impl DomainEvent for ReservationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReservationEvent::Created(_) => "Created",
            ReservationEvent::Canceled(_) => "Canceled",
            ReservationEvent::Completed(_) => "Completed",
        }
    }

    fn payload(&self) -> EventSourcingResult<Value> {
        let payload = match self {
            ReservationEvent::Created(e) => serde_json::to_value(e)?,
            ReservationEvent::Canceled(e) => serde_json::to_value(e)?,
            ReservationEvent::Completed(e) => serde_json::to_value(e)?,
        };
        Ok(payload)
    }

    fn decode(event_type: &str, payload: Value) -> EventSourcingResult<Self> {
        match event_type {
            "Created" => Ok(ReservationEvent::Created(serde_json::from_value(payload)?)),
            "Canceled" => Ok(ReservationEvent::Canceled(serde_json::from_value(payload)?)),
            "Completed" => Ok(ReservationEvent::Completed(serde_json::from_value(payload)?)),
            other => Err(EventSourcingError::UnknownEventType {
                aggregate_type: "Reservation",
                event_type: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Reservation Created - Initial event in reservation lifecycle
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReservationCreated {
    pub client_name: String,
    pub salon_id: SalonId,
    pub service: String,
}

/// Reservation Canceled - terminal
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ReservationCanceled {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reservation Completed - service delivered
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ReservationCompleted {}
