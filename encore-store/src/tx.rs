use encore_core::models::{Booking, SeatStatus, Ticket};
use uuid::Uuid;

/// A guarded seat status change. The expected status is re-validated at
/// commit time; a mismatch aborts the whole transaction.
#[derive(Debug, Clone)]
pub struct SeatTransition {
    pub event_id: Uuid,
    pub seat_id: String,
    pub expected: SeatStatus,
    pub next: SeatStatus,
}

/// Staged unit of work applied atomically by
/// [`ReservationStore::commit`](crate::ReservationStore::commit): either
/// every seat transition, booking write, and ticket insert lands, or none
/// do.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) seat_transitions: Vec<SeatTransition>,
    pub(crate) booking_upserts: Vec<Booking>,
    pub(crate) ticket_inserts: Vec<Ticket>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition_seat(
        &mut self,
        event_id: Uuid,
        seat_id: &str,
        expected: SeatStatus,
        next: SeatStatus,
    ) -> &mut Self {
        self.seat_transitions.push(SeatTransition {
            event_id,
            seat_id: seat_id.to_string(),
            expected,
            next,
        });
        self
    }

    pub fn upsert_booking(&mut self, booking: Booking) -> &mut Self {
        self.booking_upserts.push(booking);
        self
    }

    pub fn insert_ticket(&mut self, ticket: Ticket) -> &mut Self {
        self.ticket_inserts.push(ticket);
        self
    }
}
