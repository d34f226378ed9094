use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use encore_core::error::{BookingError, BookingResult};

type SeatKey = (Uuid, String);
type LockTable = Arc<StdMutex<HashMap<SeatKey, Arc<Mutex<()>>>>>;

/// Exclusive locks held on every seat a booking attempt touches; releasing
/// is by drop, so commit, abort, and panic unwind all give the locks back.
#[derive(Debug)]
pub struct SeatLockSet {
    event_id: Uuid,
    seat_ids: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
    table: LockTable,
}

impl SeatLockSet {
    /// The locked identifiers, in acquisition (canonical) order.
    pub fn seat_ids(&self) -> &[String] {
        &self.seat_ids
    }
}

impl Drop for SeatLockSet {
    fn drop(&mut self) {
        // Release the locks before sweeping, so an uncontended entry's only
        // remaining Arc is the table's own.
        self.guards.clear();
        collect_idle_entries(&self.table, self.event_id, &self.seat_ids);
    }
}

/// Remove table entries nobody holds or waits on. A waiter keeps a clone of
/// the entry's Arc while parked in `lock_owned`, so a strong count of 1
/// means the table reference is the last one.
fn collect_idle_entries(table: &LockTable, event_id: Uuid, seat_ids: &[String]) {
    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
    for seat_id in seat_ids {
        let key = (event_id, seat_id.clone());
        if table.get(&key).map(Arc::strong_count) == Some(1) {
            table.remove(&key);
        }
    }
}

/// Hands out per-seat exclusive locks for the duration of one booking
/// transaction.
///
/// Requested identifiers are always acquired in lexicographic order, so two
/// attempts sharing seats acquire them in the same relative order and
/// circular wait is impossible. Each acquisition is bounded; on timeout
/// every lock already taken for the attempt is released before the error
/// returns.
///
/// Table entries live only as long as someone holds or waits on them:
/// releasing a lock set sweeps its uncontended entries, so request input
/// naming arbitrary identifiers cannot grow the table permanently.
pub struct LockCoordinator {
    table: LockTable,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self {
            table: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn entry(&self, event_id: Uuid, seat_id: &str) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .entry((event_id, seat_id.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Current number of live lock entries, across all events.
    pub fn entry_count(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Acquire exclusive locks on the named seats, in canonical order,
    /// waiting at most `wait` per seat.
    pub async fn lock_seats(
        &self,
        event_id: Uuid,
        seat_ids: &[String],
        wait: Duration,
    ) -> BookingResult<SeatLockSet> {
        let mut ordered: Vec<String> = seat_ids.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for seat_id in &ordered {
            let lock = self.entry(event_id, seat_id);
            match tokio::time::timeout(wait, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    debug!("Lock wait timed out on seat {}", seat_id);
                    // Give back everything acquired so far, then sweep the
                    // entries this attempt touched.
                    drop(guards);
                    collect_idle_entries(&self.table, event_id, &ordered);
                    return Err(BookingError::SeatLockTimeout {
                        seat_id: seat_id.clone(),
                    });
                }
            }
        }

        Ok(SeatLockSet {
            event_id,
            seat_ids: ordered,
            guards,
            table: self.table.clone(),
        })
    }
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn reversed_requests_acquire_in_the_same_order() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_id = Uuid::new_v4();
        let forward = vec!["A01-01".to_string(), "A01-02".to_string()];
        let reversed = vec!["A01-02".to_string(), "A01-01".to_string()];

        let locks = coordinator.lock_seats(event_id, &forward, WAIT).await.unwrap();
        assert_eq!(locks.seat_ids(), &["A01-01", "A01-02"]);
        drop(locks);

        let locks = coordinator.lock_seats(event_id, &reversed, WAIT).await.unwrap();
        assert_eq!(locks.seat_ids(), &["A01-01", "A01-02"]);
    }

    #[tokio::test]
    async fn timeout_releases_partial_acquisitions() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_id = Uuid::new_v4();

        // Hold the later seat so a two-seat attempt acquires the first,
        // then times out on the second.
        let blocker = coordinator
            .lock_seats(event_id, &["A01-02".to_string()], WAIT)
            .await
            .unwrap();

        let err = coordinator
            .lock_seats(
                event_id,
                &["A01-01".to_string(), "A01-02".to_string()],
                WAIT,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SeatLockTimeout { ref seat_id } if seat_id == "A01-02"));

        // A01-01 must have been released by the failed attempt.
        let relock = coordinator
            .lock_seats(event_id, &["A01-01".to_string()], WAIT)
            .await;
        assert!(relock.is_ok());

        drop(blocker);
        let relock = coordinator
            .lock_seats(event_id, &["A01-02".to_string()], WAIT)
            .await;
        assert!(relock.is_ok());
    }

    #[tokio::test]
    async fn locks_are_scoped_per_event() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_a = Uuid::new_v4();
        let event_b = Uuid::new_v4();
        let seat = vec!["A01-01".to_string()];

        let _held = coordinator.lock_seats(event_a, &seat, WAIT).await.unwrap();
        // Same identifier on a different event does not contend.
        let other = coordinator.lock_seats(event_b, &seat, WAIT).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_swept_from_the_table() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_id = Uuid::new_v4();

        let locks = coordinator
            .lock_seats(
                event_id,
                &["A01-01".to_string(), "A01-02".to_string()],
                WAIT,
            )
            .await
            .unwrap();
        assert_eq!(coordinator.entry_count(), 2);

        drop(locks);
        assert_eq!(coordinator.entry_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn contended_entries_survive_the_sweep() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_id = Uuid::new_v4();
        let seat = vec!["A01-01".to_string()];

        let held = coordinator.lock_seats(event_id, &seat, WAIT).await.unwrap();

        // Park a waiter on the same seat, then release the holder: the
        // entry must outlive the holder's sweep and pass to the waiter.
        let waiter = {
            let coordinator = coordinator.clone();
            let seat = seat.clone();
            tokio::spawn(async move {
                coordinator
                    .lock_seats(event_id, &seat, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        let locks = waiter.await.unwrap().unwrap();
        assert_eq!(locks.seat_ids(), &["A01-01"]);
        assert_eq!(coordinator.entry_count(), 1);

        drop(locks);
        assert_eq!(coordinator.entry_count(), 0);
    }

    #[tokio::test]
    async fn timed_out_attempts_leave_no_orphan_entries() {
        let coordinator = Arc::new(LockCoordinator::new());
        let event_id = Uuid::new_v4();

        let blocker = coordinator
            .lock_seats(event_id, &["A01-02".to_string()], WAIT)
            .await
            .unwrap();

        coordinator
            .lock_seats(
                event_id,
                &["A01-01".to_string(), "A01-02".to_string()],
                WAIT,
            )
            .await
            .unwrap_err();

        // Only the blocker's entry remains; A01-01 was swept with the
        // failed attempt.
        assert_eq!(coordinator.entry_count(), 1);
        drop(blocker);
        assert_eq!(coordinator.entry_count(), 0);
    }
}
