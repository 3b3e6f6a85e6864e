use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::Aggregate;
use super::value_objects::{ReservationStatus, SalonId};
use super::events::*;
use super::commands::ReservationCommand;
use super::errors::ReservationError;

// ============================================================================
// Reservation Aggregate - Domain Logic
// ============================================================================
//
// Lifecycle:
//   Created -> Pending
//   Pending -> Completed | Canceled
//   Completed -> Canceled   (a completed visit can still be voided)
//   Canceled is terminal
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationAggregate {
    // Identity
    pub id: Uuid,

    // Current State (derived from events)
    pub client_name: String,
    pub salon_id: SalonId,
    pub service: String,
    pub status: ReservationStatus,
    pub cancel_reason: Option<String>,
}

impl ReservationAggregate {
    fn validate_not_blank(value: &str, error: ReservationError) -> Result<(), ReservationError> {
        if value.trim().is_empty() {
            return Err(error);
        }
        Ok(())
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for ReservationAggregate {
    type Event = ReservationEvent;
    type Command = ReservationCommand;
    type Error = ReservationError;

    const AGGREGATE_TYPE: &'static str = "Reservation";

    fn initialize(command: &Self::Command) -> Result<Self::Event, Self::Error> {
        match command {
            ReservationCommand::CreateReservation { client_name, salon_id, service } => {
                Self::validate_not_blank(client_name, ReservationError::EmptyClientName)?;
                Self::validate_not_blank(salon_id.as_str(), ReservationError::EmptySalonId)?;
                Self::validate_not_blank(service, ReservationError::EmptyService)?;

                Ok(ReservationEvent::Created(ReservationCreated {
                    client_name: client_name.clone(),
                    salon_id: salon_id.clone(),
                    service: service.clone(),
                }))
            }
            _ => Err(ReservationError::NotInitialized),
        }
    }

    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            ReservationEvent::Created(e) => Ok(Self {
                id: aggregate_id,
                client_name: e.client_name.clone(),
                salon_id: e.salon_id.clone(),
                service: e.service.clone(),
                status: ReservationStatus::Pending,
                cancel_reason: None,
            }),
            _ => Err(ReservationError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ReservationEvent::Created(_) => Err(ReservationError::AlreadyCreated),
            ReservationEvent::Canceled(e) => {
                self.status = ReservationStatus::Canceled;
                self.cancel_reason = e.reason.clone();
                Ok(())
            }
            ReservationEvent::Completed(_) => {
                self.status = ReservationStatus::Completed;
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Self::Event, Self::Error> {
        match command {
            ReservationCommand::CreateReservation { .. } => Err(ReservationError::AlreadyCreated),

            ReservationCommand::CancelReservation { reason } => {
                match self.status {
                    ReservationStatus::Canceled => return Err(ReservationError::AlreadyCanceled),
                    ReservationStatus::Pending | ReservationStatus::Completed => {}
                }

                Ok(ReservationEvent::Canceled(ReservationCanceled {
                    reason: reason.clone(),
                }))
            }

            ReservationCommand::CompleteReservation => {
                match self.status {
                    ReservationStatus::Pending => {}
                    ReservationStatus::Completed => return Err(ReservationError::AlreadyCompleted),
                    ReservationStatus::Canceled => {
                        return Err(ReservationError::InvalidStatusTransition {
                            action: "complete",
                            status: self.status,
                        })
                    }
                }

                Ok(ReservationEvent::Completed(ReservationCompleted {}))
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
