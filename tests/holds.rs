//! Hold lifecycle tests: place, renew, release, expire, sweep.
//!
//! Everything runs against the in-memory ledger, so no Postgres or Redis
//! is needed. The services are the real ones used by the HTTP layer.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::broadcast;

use cinema_booking::error::AppError;
use cinema_booking::ledger::{Actor, MemorySeatLedger, SeatLedger};
use cinema_booking::models::{NewShow, SeatEvent, SeatStatus};
use cinema_booking::services::{BookingService, HoldService};

struct Harness {
    ledger: Arc<dyn SeatLedger>,
    holds: HoldService,
    bookings: BookingService,
    events: broadcast::Sender<SeatEvent>,
}

fn harness(hold_ttl_seconds: i64) -> Harness {
    let ledger: Arc<dyn SeatLedger> = Arc::new(MemorySeatLedger::new());
    let (events, _) = broadcast::channel(256);
    Harness {
        holds: HoldService::new(ledger.clone(), events.clone(), hold_ttl_seconds),
        bookings: BookingService::new(ledger.clone(), events.clone(), false),
        ledger,
        events,
    }
}

async fn create_show(h: &Harness) -> i64 {
    h.ledger
        .create_show(NewShow {
            movie_title: "Blade Runner 2049".to_string(),
            screen: "Screen 3".to_string(),
            starts_at: Utc::now() + chrono::Duration::hours(6),
            price: 150.0,
        })
        .await
        .unwrap()
        .id
}

async fn seat_status(h: &Harness, show_id: i64, label: &str) -> SeatStatus {
    let seats = h
        .ledger
        .seats_by_labels(show_id, &[label.to_string()])
        .await
        .unwrap();
    seats[0].status
}

fn drain(rx: &mut broadcast::Receiver<SeatEvent>) -> Vec<SeatEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

// ============================================================================
// Placing holds
// ============================================================================

#[tokio::test]
async fn block_marks_seat_and_reports_expiry() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    let expires_at = h.holds.block(1, show_id, "A1").await.unwrap();
    assert!(expires_at > Utc::now());
    assert_eq!(seat_status(&h, show_id, "A1").await, SeatStatus::Blocked);
}

#[tokio::test]
async fn two_users_cannot_hold_the_same_seat() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "A1").await.unwrap();
    let err = h.holds.block(2, show_id, "A1").await.unwrap_err();
    match err {
        AppError::Conflict { seats, .. } => assert_eq!(seats, vec!["A1".to_string()]),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn block_rejects_out_of_grid_labels() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    for label in ["K1", "A11", "A0", "a1", "A01", ""] {
        let err = h.holds.block(1, show_id, label).await.unwrap_err();
        assert!(
            matches!(err, AppError::Validation(_)),
            "label {:?} should be rejected",
            label
        );
    }
}

#[tokio::test]
async fn renewal_by_owner_extends_expiry() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    let first = h.holds.block(1, show_id, "B2").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(30)).await;
    let second = h.holds.block(1, show_id, "B2").await.unwrap();

    assert!(second > first, "renewal must reset the clock");
    assert_eq!(seat_status(&h, show_id, "B2").await, SeatStatus::Blocked);
}

#[tokio::test]
async fn lapsed_hold_is_free_for_a_rival() {
    let short = harness(0);
    let show_id = create_show(&short).await;

    short.holds.block(1, show_id, "C3").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    // место досталось другому без явного release
    let long = HoldService::new(short.ledger.clone(), short.events.clone(), 300);
    long.block(2, show_id, "C3").await.unwrap();

    let seats = short
        .ledger
        .seats_by_labels(show_id, &["C3".to_string()])
        .await
        .unwrap();
    assert_eq!(seats[0].hold_user, Some(2));
}

// ============================================================================
// Releasing holds
// ============================================================================

#[tokio::test]
async fn owner_release_frees_the_seat() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "D4").await.unwrap();
    let released = h.holds.release(Actor::User(1), show_id, "D4").await.unwrap();
    assert!(released);
    assert_eq!(seat_status(&h, show_id, "D4").await, SeatStatus::Available);

    // после release место может взять кто угодно
    h.holds.block(2, show_id, "D4").await.unwrap();
}

#[tokio::test]
async fn release_of_free_seat_is_idempotent() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    assert!(!h.holds.release(Actor::User(1), show_id, "E5").await.unwrap());
    assert!(!h.holds.release(Actor::User(1), show_id, "E5").await.unwrap());
}

#[tokio::test]
async fn release_by_non_owner_is_rejected() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "F6").await.unwrap();
    let err = h
        .holds
        .release(Actor::User(2), show_id, "F6")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
    assert_eq!(seat_status(&h, show_id, "F6").await, SeatStatus::Blocked);
}

#[tokio::test]
async fn admin_releases_any_live_hold() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "G7").await.unwrap();
    let released = h.holds.release(Actor::Admin, show_id, "G7").await.unwrap();
    assert!(released);
    assert_eq!(seat_status(&h, show_id, "G7").await, SeatStatus::Available);
}

#[tokio::test]
async fn booked_seat_cannot_be_released_as_a_hold() {
    let h = harness(300);
    let show_id = create_show(&h).await;

    h.bookings
        .book(1, show_id, &["H8".to_string()], 150.0)
        .await
        .unwrap();

    let err = h
        .holds
        .release(Actor::User(1), show_id, "H8")
        .await
        .unwrap_err();
    match err {
        AppError::Conflict { message, .. } => {
            assert!(message.contains("cancel"), "got: {}", message)
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(seat_status(&h, show_id, "H8").await, SeatStatus::Booked);
}

// ============================================================================
// Expiry and sweep
// ============================================================================

#[tokio::test]
async fn expired_hold_reads_as_available_before_sweep() {
    let h = harness(0);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "I9").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let seats = h
        .ledger
        .seats_by_labels(show_id, &["I9".to_string()])
        .await
        .unwrap();
    // строка ещё blocked, но для всех читателей место свободно
    assert_eq!(seats[0].status, SeatStatus::Blocked);
    assert_eq!(seats[0].effective_status(Utc::now()), SeatStatus::Available);
}

#[tokio::test]
async fn sweep_releases_only_lapsed_holds() {
    let h = harness(0);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "A1").await.unwrap();
    let long = HoldService::new(h.ledger.clone(), h.events.clone(), 300);
    long.block(2, show_id, "A2").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let report = h.holds.sweep().await.unwrap();
    assert_eq!(report.released, vec![(show_id, "A1".to_string())]);

    assert_eq!(seat_status(&h, show_id, "A1").await, SeatStatus::Available);
    assert_eq!(seat_status(&h, show_id, "A2").await, SeatStatus::Blocked);
}

#[tokio::test]
async fn sweep_twice_finds_nothing_the_second_time() {
    let h = harness(0);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "B1").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    assert_eq!(h.holds.sweep().await.unwrap().len(), 1);
    assert!(h.holds.sweep().await.unwrap().is_empty());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn block_and_release_emit_events() {
    let h = harness(300);
    let show_id = create_show(&h).await;
    let mut rx = h.events.subscribe();

    let expires_at = h.holds.block(1, show_id, "C1").await.unwrap();
    h.holds.release(Actor::User(1), show_id, "C1").await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            SeatEvent::Blocked {
                show_id,
                seat_label: "C1".to_string(),
                expires_at,
            },
            SeatEvent::Released {
                show_id,
                seat_label: "C1".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn sweep_emits_hold_expired_events() {
    let h = harness(0);
    let show_id = create_show(&h).await;

    h.holds.block(1, show_id, "D1").await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let mut rx = h.events.subscribe();
    h.holds.sweep().await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![SeatEvent::HoldExpired {
            show_id,
            seat_label: "D1".to_string(),
        }]
    );
}

#[tokio::test]
async fn noop_release_emits_nothing() {
    let h = harness(300);
    let show_id = create_show(&h).await;
    let mut rx = h.events.subscribe();

    h.holds.release(Actor::User(1), show_id, "E1").await.unwrap();
    assert!(drain(&mut rx).is_empty());
}
