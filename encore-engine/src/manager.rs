use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use encore_core::error::{BookingError, BookingResult};
use encore_core::events::{BookingChangedEvent, EngineEvent, SeatReleasedEvent};
use encore_core::models::{Booking, BookingStatus, SeatStatus, Ticket};
use encore_store::app_config::EngineRules;
use encore_store::{EventBus, LockCoordinator, ReservationStore, Transaction};

/// Owns the booking and ticket lifecycle.
///
/// Every mutation follows the same discipline: validate, take ordered
/// per-seat locks, re-check state under lock, stage a transaction, commit
/// atomically, publish. Locks are released by drop on every path, so a
/// failed attempt leaves no lock held and no partial state behind.
pub struct BookingManager {
    store: Arc<ReservationStore>,
    locks: Arc<LockCoordinator>,
    events: EventBus,
    rules: EngineRules,
}

impl BookingManager {
    pub fn new(
        store: Arc<ReservationStore>,
        locks: Arc<LockCoordinator>,
        events: EventBus,
        rules: EngineRules,
    ) -> Self {
        Self {
            store,
            locks,
            events,
            rules,
        }
    }

    pub fn store(&self) -> &Arc<ReservationStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Book the named seats in one atomic step: seats go straight to
    /// Booked, the booking is Confirmed, and one ticket is issued per seat.
    ///
    /// Retrying after any failure is always safe: no side effect persists
    /// on an error path.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        seat_ids: &[String],
    ) -> BookingResult<Booking> {
        let seat_ids = validate_seat_ids(seat_ids)?;
        self.ensure_event(event_id).await?;

        let _locks = self
            .locks
            .lock_seats(event_id, &seat_ids, self.rules.seat_lock_wait())
            .await?;

        self.check_all_available(event_id, &seat_ids).await?;

        let booking = Booking::confirmed(user_id, event_id, seat_ids.clone());
        let mut tx = Transaction::new();
        for seat_id in &seat_ids {
            tx.transition_seat(event_id, seat_id, SeatStatus::Available, SeatStatus::Booked);
            tx.insert_ticket(Ticket::issue(booking.id, event_id, seat_id));
        }
        tx.upsert_booking(booking.clone());

        self.commit_with_retry(&tx).await?;

        info!(
            "Booking {} confirmed for user {} ({} seat(s))",
            booking.id,
            user_id,
            seat_ids.len()
        );
        self.publish_booking_changed(booking.id, BookingStatus::Confirmed);
        Ok(booking)
    }

    /// Two-phase variant: claim the seats as Held under a Pending booking
    /// that must be confirmed within the hold window. No tickets are issued
    /// until confirmation.
    pub async fn hold_seats(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        seat_ids: &[String],
    ) -> BookingResult<Booking> {
        let seat_ids = validate_seat_ids(seat_ids)?;
        self.ensure_event(event_id).await?;

        let _locks = self
            .locks
            .lock_seats(event_id, &seat_ids, self.rules.seat_lock_wait())
            .await?;

        self.check_all_available(event_id, &seat_ids).await?;

        let expires_at = Utc::now() + self.rules.hold_window();
        let booking = Booking::pending(user_id, event_id, seat_ids.clone(), expires_at);
        let mut tx = Transaction::new();
        for seat_id in &seat_ids {
            tx.transition_seat(event_id, seat_id, SeatStatus::Available, SeatStatus::Held);
        }
        tx.upsert_booking(booking.clone());

        self.commit_with_retry(&tx).await?;

        info!(
            "Hold {} placed for user {} until {}",
            booking.id, user_id, expires_at
        );
        self.publish_booking_changed(booking.id, BookingStatus::Pending);
        Ok(booking)
    }

    /// Finalize a Pending hold: seats Held -> Booked, tickets issued,
    /// booking Confirmed.
    pub async fn confirm_booking(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
    ) -> BookingResult<Booking> {
        let booking = self
            .store
            .booking(booking_id)
            .await
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.user_id != requester_id {
            return Err(BookingError::NotOwner);
        }

        let _locks = self
            .locks
            .lock_seats(
                booking.event_id,
                &booking.seat_ids,
                self.rules.seat_lock_wait(),
            )
            .await?;

        // The sweeper may have expired the hold while we waited for locks.
        let mut booking = self
            .store
            .booking(booking_id)
            .await
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Confirmed.to_string(),
            });
        }

        booking.status = BookingStatus::Confirmed;
        booking.expires_at = None;

        let mut tx = Transaction::new();
        for seat_id in &booking.seat_ids {
            tx.transition_seat(booking.event_id, seat_id, SeatStatus::Held, SeatStatus::Booked);
            tx.insert_ticket(Ticket::issue(booking.id, booking.event_id, seat_id));
        }
        tx.upsert_booking(booking.clone());

        self.commit_with_retry(&tx).await?;

        info!("Hold {} confirmed for user {}", booking.id, requester_id);
        self.publish_booking_changed(booking.id, BookingStatus::Confirmed);
        Ok(booking)
    }

    /// User-initiated cancellation of a Confirmed booking. Frees the seats
    /// back to Available and emits one seat-release per freed seat, which
    /// feeds waitlist promotion and cache invalidation.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        requester_id: Uuid,
    ) -> BookingResult<Booking> {
        let booking = self
            .store
            .booking(booking_id)
            .await
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.user_id != requester_id {
            return Err(BookingError::NotOwner);
        }
        if booking.status.is_terminal() {
            return Err(BookingError::AlreadyCancelled);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }

        let _locks = self
            .locks
            .lock_seats(
                booking.event_id,
                &booking.seat_ids,
                self.rules.seat_lock_wait(),
            )
            .await?;

        // Re-check under lock; a racing cancel may have won.
        let mut booking = self
            .store
            .booking(booking_id)
            .await
            .ok_or(BookingError::NotFound(booking_id))?;
        if booking.status.is_terminal() {
            return Err(BookingError::AlreadyCancelled);
        }

        booking.status = BookingStatus::Cancelled;

        let mut tx = Transaction::new();
        for seat_id in &booking.seat_ids {
            tx.transition_seat(booking.event_id, seat_id, SeatStatus::Booked, SeatStatus::Available);
        }
        tx.upsert_booking(booking.clone());

        self.commit_with_retry(&tx).await?;

        info!("Booking {} cancelled by user {}", booking.id, requester_id);
        self.publish_seats_released(booking.event_id, &booking.seat_ids);
        self.publish_booking_changed(booking.id, BookingStatus::Cancelled);
        Ok(booking)
    }

    /// Sweeper entry point: reclaim the seats of a Pending hold whose
    /// window has elapsed. Returns false when the booking had already
    /// transitioned out of Pending by the time the locks were held, so
    /// concurrent sweeps never double-process.
    pub async fn expire_booking(&self, booking_id: Uuid) -> BookingResult<bool> {
        let booking = match self.store.booking(booking_id).await {
            Some(b) if b.status == BookingStatus::Pending => b,
            _ => return Ok(false),
        };

        let _locks = self
            .locks
            .lock_seats(
                booking.event_id,
                &booking.seat_ids,
                self.rules.seat_lock_wait(),
            )
            .await?;

        let mut booking = match self.store.booking(booking_id).await {
            Some(b) if b.status == BookingStatus::Pending => b,
            _ => return Ok(false),
        };

        booking.status = BookingStatus::Expired;
        booking.expires_at = None;

        let mut tx = Transaction::new();
        for seat_id in &booking.seat_ids {
            tx.transition_seat(booking.event_id, seat_id, SeatStatus::Held, SeatStatus::Available);
        }
        tx.upsert_booking(booking.clone());

        self.commit_with_retry(&tx).await?;

        info!("Hold {} expired, {} seat(s) reclaimed", booking.id, booking.seat_ids.len());
        self.publish_seats_released(booking.event_id, &booking.seat_ids);
        self.publish_booking_changed(booking.id, BookingStatus::Expired);
        Ok(true)
    }

    async fn ensure_event(&self, event_id: Uuid) -> BookingResult<()> {
        self.store
            .event(event_id)
            .await
            .map(|_| ())
            .ok_or(BookingError::EventNotFound(event_id))
    }

    /// Re-check every requested seat under lock. Any seat not Available
    /// fails the whole attempt, naming all conflicting seats; there is
    /// never a partial booking of the subset that was free.
    async fn check_all_available(
        &self,
        event_id: Uuid,
        seat_ids: &[String],
    ) -> BookingResult<()> {
        let mut unavailable = Vec::new();
        for seat_id in seat_ids {
            match self.store.seat_status(event_id, seat_id).await? {
                SeatStatus::Available => {}
                _ => unavailable.push(seat_id.clone()),
            }
        }
        if unavailable.is_empty() {
            Ok(())
        } else {
            Err(BookingError::SeatUnavailable {
                seat_ids: unavailable,
            })
        }
    }

    /// `CommitFailure` is assumed transient and retried once; a second
    /// failure surfaces to the caller, who may retry the whole attempt
    /// since nothing persisted.
    async fn commit_with_retry(&self, tx: &Transaction) -> BookingResult<()> {
        match self.store.commit(tx).await {
            Err(BookingError::CommitFailure(reason)) => {
                warn!("Commit failed ({}), retrying once", reason);
                self.store.commit(tx).await
            }
            other => other,
        }
    }

    fn publish_booking_changed(&self, booking_id: Uuid, status: BookingStatus) {
        self.events
            .publish(EngineEvent::BookingChanged(BookingChangedEvent {
                booking_id,
                status,
            }));
    }

    fn publish_seats_released(&self, event_id: Uuid, seat_ids: &[String]) {
        let released_at = Utc::now().timestamp();
        for seat_id in seat_ids {
            self.events
                .publish(EngineEvent::SeatReleased(SeatReleasedEvent {
                    event_id,
                    seat_id: seat_id.clone(),
                    released_at,
                }));
        }
    }
}

fn validate_seat_ids(seat_ids: &[String]) -> BookingResult<Vec<String>> {
    if seat_ids.is_empty() {
        return Err(BookingError::InvalidRequest(
            "seat list must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for seat_id in seat_ids {
        if !seen.insert(seat_id.as_str()) {
            return Err(BookingError::InvalidRequest(format!(
                "duplicate seat in request: {}",
                seat_id
            )));
        }
    }
    Ok(seat_ids.to_vec())
}
