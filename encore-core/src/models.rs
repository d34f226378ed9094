use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    /// Cancelled and Expired bookings never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Booked => "BOOKED",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// An event that owns a set of bookable seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One bookable seat, identified within its event by a human-readable
/// code such as "A01-07".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub event_id: Uuid,
    pub seat_id: String,
    pub status: SeatStatus,
}

/// A booking claims an ordered, duplicate-free, non-empty set of seats.
/// The seat set is immutable after creation; changing seats means
/// cancel-and-rebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_ids: Vec<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    /// Set only while the booking is a Pending hold.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn confirmed(user_id: Uuid, event_id: Uuid, seat_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            seat_ids,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn pending(
        user_id: Uuid,
        event_id: Uuid,
        seat_ids: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            seat_ids,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            expires_at: Some(expires_at),
        }
    }
}

/// One ticket per (booking, seat), carrying a unique verification token.
/// Tickets are never re-issued for a different seat; a cancelled or
/// expired booking voids its tickets by way of its terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub seat_id: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(booking_id: Uuid, event_id: Uuid, seat_id: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            booking_id,
            event_id,
            seat_id: seat_id.to_string(),
            token: format!("booking_{}_seat_{}_{}", booking_id.simple(), seat_id, id.simple()),
            issued_at: Utc::now(),
        }
    }
}

/// Waitlist membership for one (user, event) pair. `joined_at` defines
/// first-come-first-served priority; entries are consumed exactly once,
/// on successful promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub joined_at: DateTime<Utc>,
}
