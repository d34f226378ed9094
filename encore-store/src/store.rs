use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use encore_core::error::{BookingError, BookingResult};
use encore_core::models::{
    Booking, BookingStatus, EventRecord, Seat, SeatStatus, Ticket, WaitlistEntry,
};

use crate::tx::Transaction;

/// Simple linear layout: A01-01 .. A01-NN.
pub fn default_seat_layout(total_capacity: usize) -> Vec<String> {
    (1..=total_capacity).map(|i| format!("A01-{:02}", i)).collect()
}

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, EventRecord>,
    /// event_id -> seat_id -> Seat, ordered by seat identifier.
    seats: HashMap<Uuid, BTreeMap<String, Seat>>,
    bookings: HashMap<Uuid, Booking>,
    /// booking_id -> tickets, in seat order of the booking.
    tickets: HashMap<Uuid, Vec<Ticket>>,
    /// event_id -> waitlist entries, unordered; sorted on read.
    waitlist: HashMap<Uuid, Vec<WaitlistEntry>>,
}

/// Single source of truth for seat, booking, ticket, and waitlist state.
///
/// Every table lives behind one `RwLock`, so [`commit`](Self::commit) is an
/// atomic multi-row write: readers never observe a half-applied booking.
/// Status reads always see the latest committed state; there is no caching
/// inside the store.
pub struct ReservationStore {
    inner: RwLock<Inner>,
    /// Remaining commits to fail, for atomicity/retry testing.
    commit_faults: AtomicUsize,
}

impl ReservationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            commit_faults: AtomicUsize::new(0),
        }
    }

    /// Create an event and seed its seat set in one write. Duplicate seat
    /// identifiers in the provided layout are dropped defensively.
    pub async fn create_event(
        &self,
        name: &str,
        seat_identifiers: &[String],
    ) -> BookingResult<EventRecord> {
        if seat_identifiers.is_empty() {
            return Err(BookingError::InvalidRequest(
                "event needs at least one seat".to_string(),
            ));
        }

        let event = EventRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        let mut seats = BTreeMap::new();
        for seat_id in seat_identifiers {
            seats.entry(seat_id.clone()).or_insert_with(|| Seat {
                event_id: event.id,
                seat_id: seat_id.clone(),
                status: SeatStatus::Available,
            });
        }

        let mut inner = self.inner.write().await;
        inner.events.insert(event.id, event.clone());
        inner.seats.insert(event.id, seats);
        info!("Created event {} ({})", event.name, event.id);
        Ok(event)
    }

    pub async fn event(&self, event_id: Uuid) -> Option<EventRecord> {
        self.inner.read().await.events.get(&event_id).cloned()
    }

    pub async fn seat_status(&self, event_id: Uuid, seat_id: &str) -> BookingResult<SeatStatus> {
        let inner = self.inner.read().await;
        let seats = inner
            .seats
            .get(&event_id)
            .ok_or(BookingError::EventNotFound(event_id))?;
        seats
            .get(seat_id)
            .map(|s| s.status)
            .ok_or_else(|| BookingError::SeatNotFound {
                seat_id: seat_id.to_string(),
            })
    }

    /// Atomic compare-and-set on one seat's status. Returns false without
    /// mutating when the current status does not match `expected`. Callers
    /// must hold the seat's coordinator lock.
    pub async fn compare_and_set_status(
        &self,
        event_id: Uuid,
        seat_id: &str,
        expected: SeatStatus,
        next: SeatStatus,
    ) -> BookingResult<bool> {
        let mut inner = self.inner.write().await;
        let seats = inner
            .seats
            .get_mut(&event_id)
            .ok_or(BookingError::EventNotFound(event_id))?;
        let seat = seats
            .get_mut(seat_id)
            .ok_or_else(|| BookingError::SeatNotFound {
                seat_id: seat_id.to_string(),
            })?;
        if seat.status != expected {
            return Ok(false);
        }
        seat.status = next;
        Ok(true)
    }

    /// Apply a staged transaction atomically: every seat transition is
    /// validated against current state before anything mutates, so a
    /// failure applies nothing.
    pub async fn commit(&self, tx: &Transaction) -> BookingResult<()> {
        let mut inner = self.inner.write().await;

        if self
            .commit_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BookingError::CommitFailure(
                "injected commit fault".to_string(),
            ));
        }

        // Validate first.
        for t in &tx.seat_transitions {
            let seats = inner
                .seats
                .get(&t.event_id)
                .ok_or(BookingError::EventNotFound(t.event_id))?;
            let seat = seats
                .get(&t.seat_id)
                .ok_or_else(|| BookingError::SeatNotFound {
                    seat_id: t.seat_id.clone(),
                })?;
            if seat.status != t.expected {
                return Err(BookingError::CommitFailure(format!(
                    "seat {} is {}, expected {}",
                    t.seat_id, seat.status, t.expected
                )));
            }
        }

        // Then apply. Nothing below can fail.
        for t in &tx.seat_transitions {
            if let Some(seat) = inner
                .seats
                .get_mut(&t.event_id)
                .and_then(|seats| seats.get_mut(&t.seat_id))
            {
                seat.status = t.next;
            }
        }
        for booking in &tx.booking_upserts {
            inner.bookings.insert(booking.id, booking.clone());
        }
        for ticket in &tx.ticket_inserts {
            inner
                .tickets
                .entry(ticket.booking_id)
                .or_default()
                .push(ticket.clone());
        }

        debug!(
            "Committed transaction: {} seat transition(s), {} booking(s), {} ticket(s)",
            tx.seat_transitions.len(),
            tx.booking_upserts.len(),
            tx.ticket_inserts.len()
        );
        Ok(())
    }

    /// Make the next `n` commits fail, to exercise retry and atomicity
    /// behavior without real infrastructure.
    pub fn inject_commit_faults(&self, n: usize) {
        self.commit_faults.store(n, Ordering::SeqCst);
    }

    pub async fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.inner.read().await.bookings.get(&booking_id).cloned()
    }

    pub async fn tickets_for_booking(&self, booking_id: Uuid) -> Vec<Ticket> {
        self.inner
            .read()
            .await
            .tickets
            .get(&booking_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn user_bookings(&self, user_id: Uuid) -> Vec<Booking> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    /// Pending bookings whose hold window has elapsed, oldest first.
    pub async fn pending_expired_before(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let inner = self.inner.read().await;
        let mut expired: Vec<&Booking> = inner
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && b.expires_at.map(|at| at <= now).unwrap_or(false)
            })
            .collect();
        expired.sort_by_key(|b| b.created_at);
        expired.iter().map(|b| b.id).collect()
    }

    pub async fn available_seat_count(&self, event_id: Uuid) -> BookingResult<usize> {
        let inner = self.inner.read().await;
        let seats = inner
            .seats
            .get(&event_id)
            .ok_or(BookingError::EventNotFound(event_id))?;
        Ok(seats
            .values()
            .filter(|s| s.status == SeatStatus::Available)
            .count())
    }

    /// Seat identifier -> status snapshot, for read-side listings.
    pub async fn seat_map(&self, event_id: Uuid) -> BookingResult<BTreeMap<String, SeatStatus>> {
        let inner = self.inner.read().await;
        let seats = inner
            .seats
            .get(&event_id)
            .ok_or(BookingError::EventNotFound(event_id))?;
        Ok(seats
            .iter()
            .map(|(id, seat)| (id.clone(), seat.status))
            .collect())
    }

    pub async fn join_waitlist(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> BookingResult<WaitlistEntry> {
        let mut inner = self.inner.write().await;
        if !inner.events.contains_key(&event_id) {
            return Err(BookingError::EventNotFound(event_id));
        }
        let entries = inner.waitlist.entry(event_id).or_default();
        if entries.iter().any(|e| e.user_id == user_id) {
            return Err(BookingError::AlreadyWaitlisted);
        }
        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            joined_at: Utc::now(),
        };
        entries.push(entry.clone());
        info!("User {} joined waitlist for event {}", user_id, event_id);
        Ok(entry)
    }

    /// All entries for an event, earliest joiner first.
    pub async fn waitlist_for_event(&self, event_id: Uuid) -> Vec<WaitlistEntry> {
        let inner = self.inner.read().await;
        let mut entries = inner
            .waitlist
            .get(&event_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        entries
    }

    pub async fn waitlist_entries_for_user(&self, user_id: Uuid) -> Vec<WaitlistEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<WaitlistEntry> = inner
            .waitlist
            .values()
            .flatten()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        entries
    }

    /// Remove one entry; returns false when it was already gone.
    pub async fn remove_waitlist_entry(&self, entry_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        for entries in inner.waitlist.values_mut() {
            if let Some(pos) = entries.iter().position(|e| e.id == entry_id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }
}

impl Default for ReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> (ReservationStore, Uuid) {
        let store = ReservationStore::new();
        let event = store
            .create_event("Test Night", &default_seat_layout(3))
            .await
            .unwrap();
        (store, event.id)
    }

    #[tokio::test]
    async fn create_event_deduplicates_layout() {
        let store = ReservationStore::new();
        let layout = vec!["A01-01".to_string(), "A01-01".to_string(), "A01-02".to_string()];
        let event = store.create_event("Dup Night", &layout).await.unwrap();
        assert_eq!(store.available_seat_count(event.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn compare_and_set_is_guarded() {
        let (store, event_id) = seeded_store().await;

        let swapped = store
            .compare_and_set_status(event_id, "A01-01", SeatStatus::Available, SeatStatus::Booked)
            .await
            .unwrap();
        assert!(swapped);

        // Second CAS with a stale expectation fails silently.
        let swapped = store
            .compare_and_set_status(event_id, "A01-01", SeatStatus::Available, SeatStatus::Held)
            .await
            .unwrap();
        assert!(!swapped);
        assert_eq!(
            store.seat_status(event_id, "A01-01").await.unwrap(),
            SeatStatus::Booked
        );
    }

    #[tokio::test]
    async fn unknown_seat_is_an_error() {
        let (store, event_id) = seeded_store().await;
        let err = store.seat_status(event_id, "Z99-99").await.unwrap_err();
        assert!(matches!(err, BookingError::SeatNotFound { .. }));
    }

    #[tokio::test]
    async fn commit_applies_nothing_on_stale_transition() {
        let (store, event_id) = seeded_store().await;
        let booking =
            Booking::confirmed(Uuid::new_v4(), event_id, vec!["A01-01".into(), "A01-02".into()]);

        // A01-02 is already booked out from under the transaction.
        store
            .compare_and_set_status(event_id, "A01-02", SeatStatus::Available, SeatStatus::Booked)
            .await
            .unwrap();

        let mut tx = Transaction::new();
        tx.transition_seat(event_id, "A01-01", SeatStatus::Available, SeatStatus::Booked)
            .transition_seat(event_id, "A01-02", SeatStatus::Available, SeatStatus::Booked)
            .upsert_booking(booking.clone());

        let err = store.commit(&tx).await.unwrap_err();
        assert!(matches!(err, BookingError::CommitFailure(_)));

        // First seat untouched, booking absent.
        assert_eq!(
            store.seat_status(event_id, "A01-01").await.unwrap(),
            SeatStatus::Available
        );
        assert!(store.booking(booking.id).await.is_none());
    }

    #[tokio::test]
    async fn injected_faults_burn_down() {
        let (store, event_id) = seeded_store().await;
        store.inject_commit_faults(1);

        let mut tx = Transaction::new();
        tx.transition_seat(event_id, "A01-01", SeatStatus::Available, SeatStatus::Booked);

        let err = store.commit(&tx).await.unwrap_err();
        assert!(matches!(err, BookingError::CommitFailure(_)));
        assert_eq!(
            store.seat_status(event_id, "A01-01").await.unwrap(),
            SeatStatus::Available
        );

        // Fault consumed; the retry goes through.
        store.commit(&tx).await.unwrap();
        assert_eq!(
            store.seat_status(event_id, "A01-01").await.unwrap(),
            SeatStatus::Booked
        );
    }

    #[tokio::test]
    async fn waitlist_is_fifo_and_rejects_duplicates() {
        let (store, event_id) = seeded_store().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        store.join_waitlist(first, event_id).await.unwrap();
        store.join_waitlist(second, event_id).await.unwrap();

        let err = store.join_waitlist(first, event_id).await.unwrap_err();
        assert!(matches!(err, BookingError::AlreadyWaitlisted));

        let entries = store.waitlist_for_event(event_id).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_id, first);
        assert_eq!(entries[1].user_id, second);

        assert!(store.remove_waitlist_entry(entries[0].id).await);
        assert!(!store.remove_waitlist_entry(entries[0].id).await);
    }
}
