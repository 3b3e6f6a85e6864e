use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Reservation Value Objects
// ============================================================================

/// Salon identifier as issued by the salon directory, e.g. `salon_123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalonId(pub String);

impl SalonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Canceled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "Pending",
            ReservationStatus::Canceled => "Canceled",
            ReservationStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salon_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SalonId::new("salon_123")).unwrap();
        assert_eq!(json, "\"salon_123\"");
    }

    #[test]
    fn test_status_display_matches_projection_strings() {
        assert_eq!(ReservationStatus::Pending.to_string(), "Pending");
        assert_eq!(ReservationStatus::Canceled.to_string(), "Canceled");
        assert_eq!(ReservationStatus::Completed.to_string(), "Completed");
    }
}
