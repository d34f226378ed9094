use uuid::Uuid;

/// Recoverable outcomes of the reservation engine.
///
/// Contention results (`SeatUnavailable`, `SeatLockTimeout`) are expected
/// and frequent during high-demand bursts; they are separate variants so
/// callers can tell "pick another seat" apart from "try again later" and
/// both apart from genuine faults.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Seat not found: {seat_id}")]
    SeatNotFound { seat_id: String },

    #[error("Seats no longer available: {}", seat_ids.join(", "))]
    SeatUnavailable { seat_ids: Vec<String> },

    #[error("Timed out waiting for lock on seat {seat_id}")]
    SeatLockTimeout { seat_id: String },

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Booking does not belong to the requester")]
    NotOwner,

    #[error("Booking is already cancelled or expired")]
    AlreadyCancelled,

    #[error("User is already on the waitlist for this event")]
    AlreadyWaitlisted,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Commit failed: {0}")]
    CommitFailure(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    /// True for outcomes caused by losing a race for a seat, as opposed to
    /// a malformed request or an infrastructure fault.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            BookingError::SeatUnavailable { .. } | BookingError::SeatLockTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_unavailable_names_every_conflicting_seat() {
        let err = BookingError::SeatUnavailable {
            seat_ids: vec!["A01-01".to_string(), "A01-02".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Seats no longer available: A01-01, A01-02"
        );
        assert!(err.is_contention());
    }

    #[test]
    fn invalid_request_is_not_contention() {
        assert!(!BookingError::InvalidRequest("empty seat list".into()).is_contention());
    }
}
