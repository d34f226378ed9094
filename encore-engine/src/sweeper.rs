use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use crate::manager::BookingManager;

/// Background reclamation of holds that were never confirmed within the
/// hold window.
///
/// Safe to run concurrently with itself and with user confirms: expiry
/// re-checks the booking under its seat locks and skips anything that
/// already transitioned out of Pending.
pub struct ExpirySweeper {
    manager: Arc<BookingManager>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(manager: Arc<BookingManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Timer-driven loop; run as a spawned task.
    pub async fn run(&self) {
        info!("Expiry sweeper started (every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick fires immediately; skip it so a freshly started
        // engine does not sweep before anything can have expired.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Expire every over-age Pending hold; returns how many were reclaimed.
    pub async fn sweep_once(&self) -> usize {
        let due = self
            .manager
            .store()
            .pending_expired_before(Utc::now())
            .await;
        let mut reclaimed = 0;
        for booking_id in due {
            match self.manager.expire_booking(booking_id).await {
                Ok(true) => reclaimed += 1,
                // Already confirmed, cancelled, or expired by someone else.
                Ok(false) => {}
                Err(e) => error!("Failed to expire booking {}: {}", booking_id, e),
            }
        }
        if reclaimed > 0 {
            info!("Expiry sweep reclaimed {} hold(s)", reclaimed);
        }
        reclaimed
    }
}
