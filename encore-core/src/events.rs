use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::BookingStatus;

/// Emitted once per freed seat (cancellation or hold expiry). Drives
/// waitlist promotion and lets the read-side cache invalidate its seat map.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeatReleasedEvent {
    pub event_id: Uuid,
    pub seat_id: String,
    pub released_at: i64,
}

/// Emitted on every booking lifecycle transition, for the notification and
/// analytics layers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BookingChangedEvent {
    pub booking_id: Uuid,
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SeatReleased(SeatReleasedEvent),
    BookingChanged(BookingChangedEvent),
}
