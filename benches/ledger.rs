//! Criterion benches for the seat ledger hot paths.
//!
//! Measures:
//! - Seat label parsing and grid generation
//! - Guard matching over a full seat map
//! - Block/release round trip through the in-memory ledger

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use cinema_booking::ledger::{MemorySeatLedger, SeatGuard, SeatLedger, SeatWrite};
use cinema_booking::models::seat::{parse_label, seat_grid};
use cinema_booking::models::{NewShow, Seat, SeatStatus};

fn sample_seats() -> Vec<Seat> {
    let now = Utc::now();
    seat_grid()
        .into_iter()
        .enumerate()
        .map(|(i, (label, seat_row, seat_col))| {
            let mut seat = Seat {
                id: i as i64 + 1,
                show_id: 1,
                label,
                seat_row,
                seat_col,
                status: SeatStatus::Available,
                booking_id: None,
                hold_user: None,
                hold_expires_at: None,
            };
            match i % 4 {
                1 => {
                    seat.status = SeatStatus::Blocked;
                    seat.hold_user = Some((i % 7) as i64);
                    seat.hold_expires_at = Some(now + Duration::minutes(5));
                }
                2 => {
                    seat.status = SeatStatus::Blocked;
                    seat.hold_user = Some((i % 7) as i64);
                    seat.hold_expires_at = Some(now - Duration::minutes(5));
                }
                3 => {
                    seat.status = SeatStatus::Booked;
                    seat.booking_id = Some(i as i64);
                }
                _ => {}
            }
            seat
        })
        .collect()
}

fn bench_parse_label(c: &mut Criterion) {
    c.bench_function("parse_label", |b| {
        b.iter(|| {
            black_box(parse_label(black_box("J10")));
            black_box(parse_label(black_box("A1")));
            black_box(parse_label(black_box("Z99")));
        })
    });
}

fn bench_seat_grid(c: &mut Criterion) {
    c.bench_function("seat_grid", |b| b.iter(|| black_box(seat_grid())));
}

fn bench_guard_matching(c: &mut Criterion) {
    let seats = sample_seats();
    let guards = [SeatGuard::Available, SeatGuard::BlockedBy(3)];
    let now = Utc::now();

    c.bench_function("guard_match_full_map", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for seat in &seats {
                if guards.iter().any(|g| g.matches(black_box(seat), now)) {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });
}

fn bench_memory_transition(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger: Arc<dyn SeatLedger> = Arc::new(MemorySeatLedger::new());
    let show_id = rt
        .block_on(ledger.create_show(NewShow {
            movie_title: "Bench".to_string(),
            screen: "Screen 1".to_string(),
            starts_at: Utc::now() + Duration::hours(1),
            price: 100.0,
        }))
        .unwrap()
        .id;
    let labels = vec!["A1".to_string()];

    c.bench_function("block_release_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let expires_at = Utc::now() + Duration::minutes(5);
                let blocked = ledger
                    .transition_seats(
                        show_id,
                        &labels,
                        &[SeatGuard::Available],
                        SeatWrite::Blocked {
                            user_id: 1,
                            expires_at,
                        },
                    )
                    .await
                    .unwrap();
                let released = ledger
                    .transition_seats(
                        show_id,
                        &labels,
                        &[SeatGuard::BlockedBy(1)],
                        SeatWrite::Available,
                    )
                    .await
                    .unwrap();
                black_box((blocked, released))
            })
        })
    });
}

criterion_group!(
    benches,
    bench_parse_label,
    bench_seat_grid,
    bench_guard_matching,
    bench_memory_transition
);
criterion_main!(benches);
