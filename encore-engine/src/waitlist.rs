use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use encore_core::error::BookingResult;
use encore_core::events::EngineEvent;
use encore_core::models::{Booking, WaitlistEntry};
use encore_store::ReservationStore;

use crate::manager::BookingManager;

/// Offers freed seats to waiting users, earliest joiner first.
///
/// The promoter holds no lock of its own across a scan: each offer goes
/// through the ordinary `create_booking` path, so contention with regular
/// bookings is resolved by the same seat-lock mechanism. Priority is soft:
/// a direct booking racing a promotion may legitimately win the seat.
pub struct WaitlistService {
    store: Arc<ReservationStore>,
    manager: Arc<BookingManager>,
}

impl WaitlistService {
    pub fn new(store: Arc<ReservationStore>, manager: Arc<BookingManager>) -> Self {
        Self { store, manager }
    }

    pub async fn join(&self, user_id: Uuid, event_id: Uuid) -> BookingResult<WaitlistEntry> {
        self.store.join_waitlist(user_id, event_id).await
    }

    /// Withdraw a user's entry; returns false when no entry existed.
    pub async fn withdraw(&self, user_id: Uuid, event_id: Uuid) -> bool {
        let entries = self.store.waitlist_for_event(event_id).await;
        match entries.iter().find(|e| e.user_id == user_id) {
            Some(entry) => self.store.remove_waitlist_entry(entry.id).await,
            None => false,
        }
    }

    pub async fn entries_for_user(&self, user_id: Uuid) -> Vec<WaitlistEntry> {
        self.store.waitlist_entries_for_user(user_id).await
    }

    /// Consume seat-release events until the bus closes. Run as a spawned
    /// task alongside the engine.
    pub async fn run(&self, mut rx: broadcast::Receiver<EngineEvent>) {
        info!("Waitlist promoter started");
        loop {
            match rx.recv().await {
                Ok(EngineEvent::SeatReleased(released)) => {
                    if let Err(e) = self.promote(released.event_id, &released.seat_id).await {
                        error!(
                            "Promotion failed for seat {} on event {}: {}",
                            released.seat_id, released.event_id, e
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed releases only delay promotion; the seats stay
                    // Available and the next release retriggers a scan.
                    warn!("Waitlist promoter lagged, {} event(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Event bus closed, waitlist promoter stopping");
                    return;
                }
            }
        }
    }

    /// Offer one freed seat down the waitlist in join order. A failed offer
    /// does not consume the entry; the first successful one does. Returns
    /// the promoted booking, or None when nobody could take the seat.
    pub async fn promote(
        &self,
        event_id: Uuid,
        seat_id: &str,
    ) -> BookingResult<Option<Booking>> {
        let entries = self.store.waitlist_for_event(event_id).await;
        if entries.is_empty() {
            debug!("No waitlist entries for event {}", event_id);
            return Ok(None);
        }

        let seat = vec![seat_id.to_string()];
        for entry in entries {
            match self
                .manager
                .create_booking(entry.user_id, event_id, &seat)
                .await
            {
                Ok(booking) => {
                    self.store.remove_waitlist_entry(entry.id).await;
                    info!(
                        "Promoted user {} from waitlist to booking {} (seat {})",
                        entry.user_id, booking.id, seat_id
                    );
                    return Ok(Some(booking));
                }
                Err(e) if e.is_contention() => {
                    // Someone else claimed the seat first; the entry stays
                    // eligible for the next release.
                    debug!(
                        "Offer of seat {} to user {} lost the race: {}",
                        seat_id, entry.user_id, e
                    );
                }
                Err(e) => {
                    warn!(
                        "Offer of seat {} to user {} failed: {}",
                        seat_id, entry.user_id, e
                    );
                }
            }
        }
        Ok(None)
    }
}
