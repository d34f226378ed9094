use std::env;
use std::sync::Arc;
use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use encore_engine::{BookingManager, ExpirySweeper, WaitlistService};
use encore_store::app_config::Config;
use encore_store::{default_seat_layout, EventBus, LockCoordinator, ReservationStore};

/// Concurrency drill: fire N simultaneous booking attempts at one event and
/// report how contention resolved. `MODE=contend` aims every attempt at the
/// same seat; `MODE=unique` gives each attempt its own.
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_engine=info,encore_store=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mode = env::var("MODE").unwrap_or_else(|_| "contend".into());
    let requests: usize = env::var("REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Config::default()
    });
    let rules = config.engine;
    tracing::info!("Starting stress run: mode={} requests={}", mode, requests);

    let store = Arc::new(ReservationStore::new());
    let locks = Arc::new(LockCoordinator::new());
    let bus = EventBus::new(rules.event_bus_capacity);
    let manager = Arc::new(BookingManager::new(
        store.clone(),
        locks,
        bus.clone(),
        rules.clone(),
    ));

    let promoter = Arc::new(WaitlistService::new(store.clone(), manager.clone()));
    let promoter_rx = bus.subscribe();
    tokio::spawn({
        let promoter = promoter.clone();
        async move { promoter.run(promoter_rx).await }
    });

    let sweeper = ExpirySweeper::new(manager.clone(), rules.sweep_interval());
    tokio::spawn(async move { sweeper.run().await });

    let event = store
        .create_event("Stress Night", &default_seat_layout(requests.max(1)))
        .await
        .expect("seeding the stress event cannot fail");

    let start = Instant::now();
    let mut attempts = Vec::with_capacity(requests);
    for i in 0..requests {
        let manager = manager.clone();
        let seat = match mode.as_str() {
            "unique" => format!("A01-{:02}", i + 1),
            _ => "A01-01".to_string(),
        };
        attempts.push(tokio::spawn(async move {
            manager
                .create_booking(Uuid::new_v4(), event.id, &[seat])
                .await
        }));
    }

    let mut booked = 0usize;
    let mut contended = 0usize;
    let mut failed = 0usize;
    for attempt in attempts {
        match attempt.await {
            Ok(Ok(_)) => booked += 1,
            Ok(Err(e)) if e.is_contention() => contended += 1,
            Ok(Err(e)) => {
                tracing::error!("Attempt failed: {}", e);
                failed += 1;
            }
            Err(e) => {
                tracing::error!("Attempt panicked: {}", e);
                failed += 1;
            }
        }
    }
    let elapsed = start.elapsed();

    let remaining = store
        .available_seat_count(event.id)
        .await
        .expect("the stress event exists");
    println!(
        "mode={} total={} booked={} contended={} failed={} remaining_seats={} elapsed={:.3?}",
        mode, requests, booked, contended, failed, remaining, elapsed
    );
}
