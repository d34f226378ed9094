//! Outbound event contract: the engine emits one seat-release per freed
//! seat and a booking-state-changed event on every lifecycle transition,
//! in an order external layers (cache invalidation, notifications) can
//! rely on.

mod common;

use uuid::Uuid;

use common::{engine, seats};
use encore_core::events::EngineEvent;
use encore_core::models::BookingStatus;

#[tokio::test]
async fn booking_lifecycle_emits_state_changes() {
    let engine = engine();
    let event_id = engine.seed_event(1).await;
    let mut rx = engine.bus.subscribe();
    let user = Uuid::new_v4();

    let booking = engine
        .manager
        .create_booking(user, event_id, &seats(&["A01-01"]))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        EngineEvent::BookingChanged(changed) => {
            assert_eq!(changed.booking_id, booking.id);
            assert_eq!(changed.status, BookingStatus::Confirmed);
        }
        other => panic!("expected BookingChanged first, got {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_emits_one_release_per_seat_then_the_state_change() {
    let engine = engine();
    let event_id = engine.seed_event(3).await;
    let user = Uuid::new_v4();

    let booking = engine
        .manager
        .create_booking(user, event_id, &seats(&["A01-01", "A01-02", "A01-03"]))
        .await
        .unwrap();

    // Subscribe after creation so only the cancellation events arrive.
    let mut rx = engine.bus.subscribe();
    engine.manager.cancel_booking(booking.id, user).await.unwrap();

    let mut released = Vec::new();
    for _ in 0..3 {
        match rx.recv().await.unwrap() {
            EngineEvent::SeatReleased(event) => {
                assert_eq!(event.event_id, event_id);
                released.push(event.seat_id);
            }
            other => panic!("expected SeatReleased, got {:?}", other),
        }
    }
    released.sort();
    assert_eq!(released, seats(&["A01-01", "A01-02", "A01-03"]));

    match rx.recv().await.unwrap() {
        EngineEvent::BookingChanged(changed) => {
            assert_eq!(changed.booking_id, booking.id);
            assert_eq!(changed.status, BookingStatus::Cancelled);
        }
        other => panic!("expected BookingChanged, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_attempts_emit_nothing() {
    let engine = engine();
    let event_id = engine.seed_event(1).await;
    let mut rx = engine.bus.subscribe();

    engine
        .manager
        .create_booking(Uuid::new_v4(), event_id, &seats(&["Z99-99"]))
        .await
        .unwrap_err();
    engine
        .manager
        .create_booking(Uuid::new_v4(), event_id, &[])
        .await
        .unwrap_err();

    // A successful booking is the next thing on the bus, proving the failed
    // attempts published nothing.
    let booking = engine
        .manager
        .create_booking(Uuid::new_v4(), event_id, &seats(&["A01-01"]))
        .await
        .unwrap();
    match rx.recv().await.unwrap() {
        EngineEvent::BookingChanged(changed) => assert_eq!(changed.booking_id, booking.id),
        other => panic!("expected BookingChanged, got {:?}", other),
    }
}
