#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use encore_engine::{BookingManager, WaitlistService};
use encore_store::app_config::EngineRules;
use encore_store::{default_seat_layout, EventBus, LockCoordinator, ReservationStore};

pub struct TestEngine {
    pub store: Arc<ReservationStore>,
    pub locks: Arc<LockCoordinator>,
    pub bus: EventBus,
    pub manager: Arc<BookingManager>,
}

pub fn test_rules() -> EngineRules {
    EngineRules {
        seat_lock_wait_ms: 250,
        hold_window_seconds: 60,
        sweep_interval_seconds: 1,
        event_bus_capacity: 64,
    }
}

pub fn engine_with_rules(rules: EngineRules) -> TestEngine {
    let store = Arc::new(ReservationStore::new());
    let locks = Arc::new(LockCoordinator::new());
    let bus = EventBus::new(rules.event_bus_capacity);
    let manager = Arc::new(BookingManager::new(
        store.clone(),
        locks.clone(),
        bus.clone(),
        rules,
    ));
    TestEngine {
        store,
        locks,
        bus,
        manager,
    }
}

pub fn engine() -> TestEngine {
    engine_with_rules(test_rules())
}

impl TestEngine {
    pub async fn seed_event(&self, capacity: usize) -> Uuid {
        self.store
            .create_event("Integration Night", &default_seat_layout(capacity))
            .await
            .expect("seeding an event cannot fail")
            .id
    }

    pub fn waitlist(&self) -> WaitlistService {
        WaitlistService::new(self.store.clone(), self.manager.clone())
    }
}

pub fn seats(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}
