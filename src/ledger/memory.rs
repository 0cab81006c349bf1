use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::ledger::{Actor, BookingDraft, SeatGuard, SeatLedger, SeatWrite, SweepReport};
use crate::models::seat::seat_grid;
use crate::models::{Booking, BookingStatus, BookingWithSeats, NewShow, Seat, SeatStatus, Show};

#[derive(Default)]
struct MemoryState {
    next_show: i64,
    next_booking: i64,
    next_seat: i64,
    shows: BTreeMap<i64, Show>,
    // show_id -> seats in row-major order
    seats: BTreeMap<i64, Vec<Seat>>,
    bookings: BTreeMap<i64, Booking>,
}

/// Бэкенд поверх `tokio::sync::Mutex`. Один захват мьютекса накрывает
/// целую операцию, атомарность та же, что у одиночных условных
/// запросов в Postgres. На нём живут тесты и локальный запуск без
/// инфраструктуры.
#[derive(Default)]
pub struct MemorySeatLedger {
    state: Mutex<MemoryState>,
}

impl MemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_write(seat: &mut Seat, to: &SeatWrite) {
    match *to {
        SeatWrite::Available => {
            seat.status = SeatStatus::Available;
            seat.hold_user = None;
            seat.hold_expires_at = None;
            seat.booking_id = None;
        }
        SeatWrite::Blocked {
            user_id,
            expires_at,
        } => {
            seat.status = SeatStatus::Blocked;
            seat.hold_user = Some(user_id);
            seat.hold_expires_at = Some(expires_at);
            seat.booking_id = None;
        }
        SeatWrite::Booked { booking_id } => {
            seat.status = SeatStatus::Booked;
            seat.booking_id = Some(booking_id);
            seat.hold_user = None;
            seat.hold_expires_at = None;
        }
    }
}

#[async_trait]
impl SeatLedger for MemorySeatLedger {
    async fn list_seats(&self, show_id: i64) -> Result<Vec<Seat>, AppError> {
        let state = self.state.lock().await;
        Ok(state.seats.get(&show_id).cloned().unwrap_or_default())
    }

    async fn seats_by_labels(
        &self,
        show_id: i64,
        labels: &[String],
    ) -> Result<Vec<Seat>, AppError> {
        let state = self.state.lock().await;
        let Some(seats) = state.seats.get(&show_id) else {
            return Ok(Vec::new());
        };
        Ok(seats
            .iter()
            .filter(|s| labels.contains(&s.label))
            .cloned()
            .collect())
    }

    async fn transition_seats(
        &self,
        show_id: i64,
        labels: &[String],
        from: &[SeatGuard],
        to: SeatWrite,
    ) -> Result<Vec<String>, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let Some(seats) = state.seats.get_mut(&show_id) else {
            return Ok(Vec::new());
        };
        let mut moved = Vec::new();
        for label in labels {
            if let Some(seat) = seats.iter_mut().find(|s| &s.label == label) {
                if from.iter().any(|g| g.matches(seat, now)) {
                    apply_write(seat, &to);
                    moved.push(label.clone());
                }
            }
        }
        Ok(moved)
    }

    async fn sweep_expired(&self) -> Result<SweepReport, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut released = Vec::new();
        for (show_id, seats) in state.seats.iter_mut() {
            for seat in seats.iter_mut() {
                if seat.status == SeatStatus::Blocked && !seat.hold_live(now) {
                    apply_write(seat, &SeatWrite::Available);
                    released.push((*show_id, seat.label.clone()));
                }
            }
        }
        Ok(SweepReport { released })
    }

    async fn commit_booking(&self, draft: BookingDraft) -> Result<BookingWithSeats, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Utc::now();

        let Some(seats) = state.seats.get(&draft.show_id) else {
            return Err(AppError::validation(format!(
                "unknown seats: {}",
                draft.labels.join(", ")
            )));
        };

        let mut missing = Vec::new();
        let mut positions = Vec::new();
        for label in &draft.labels {
            match seats.iter().position(|s| &s.label == label) {
                Some(i) => positions.push(i),
                None => missing.push(label.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(AppError::validation(format!(
                "unknown seats: {}",
                missing.join(", ")
            )));
        }

        let unavailable: Vec<String> = positions
            .iter()
            .filter(|&&i| !draft.capture.iter().any(|g| g.matches(&seats[i], now)))
            .map(|&i| seats[i].label.clone())
            .collect();
        if !unavailable.is_empty() {
            return Err(AppError::conflict("seats unavailable", unavailable));
        }

        state.next_booking += 1;
        let booking = Booking {
            id: state.next_booking,
            user_id: draft.user_id,
            show_id: draft.show_id,
            total_amount: draft.total_amount,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
        };

        if let Some(seats) = state.seats.get_mut(&draft.show_id) {
            for i in positions {
                apply_write(
                    &mut seats[i],
                    &SeatWrite::Booked {
                        booking_id: booking.id,
                    },
                );
            }
        }
        state.bookings.insert(booking.id, booking.clone());

        Ok(BookingWithSeats {
            booking,
            seats: draft.labels,
        })
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        actor: Actor,
    ) -> Result<BookingWithSeats, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let now = Utc::now();

        let Some(existing) = state.bookings.get(&booking_id) else {
            return Err(AppError::not_found(format!(
                "booking {} not found",
                booking_id
            )));
        };
        if let Actor::User(user_id) = actor {
            if existing.user_id != user_id {
                return Err(AppError::not_found(format!(
                    "booking {} not found",
                    booking_id
                )));
            }
        }
        if existing.status == BookingStatus::Cancelled {
            return Err(AppError::AlreadyCancelled);
        }

        let show_id = existing.show_id;
        let booking = {
            let b = state
                .bookings
                .get_mut(&booking_id)
                .ok_or_else(|| AppError::not_found(format!("booking {} not found", booking_id)))?;
            b.status = BookingStatus::Cancelled;
            b.cancelled_at = Some(now);
            b.clone()
        };

        let mut released = Vec::new();
        if let Some(seats) = state.seats.get_mut(&show_id) {
            for seat in seats.iter_mut() {
                if seat.status == SeatStatus::Booked && seat.booking_id == Some(booking_id) {
                    apply_write(seat, &SeatWrite::Available);
                    released.push(seat.label.clone());
                }
            }
        }

        Ok(BookingWithSeats {
            booking,
            seats: released,
        })
    }

    async fn booking(&self, booking_id: i64) -> Result<Option<BookingWithSeats>, AppError> {
        let state = self.state.lock().await;
        let Some(booking) = state.bookings.get(&booking_id).cloned() else {
            return Ok(None);
        };
        let seats = state
            .seats
            .get(&booking.show_id)
            .map(|seats| {
                seats
                    .iter()
                    .filter(|s| s.booking_id == Some(booking_id))
                    .map(|s| s.label.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(BookingWithSeats { booking, seats }))
    }

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<BookingWithSeats>, AppError> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let seats = state
                .seats
                .get(&booking.show_id)
                .map(|seats| {
                    seats
                        .iter()
                        .filter(|s| s.booking_id == Some(booking.id))
                        .map(|s| s.label.clone())
                        .collect()
                })
                .unwrap_or_default();
            out.push(BookingWithSeats { booking, seats });
        }
        Ok(out)
    }

    async fn create_show(&self, show: NewShow) -> Result<Show, AppError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.next_show += 1;
        let created = Show {
            id: state.next_show,
            movie_title: show.movie_title,
            screen: show.screen,
            starts_at: show.starts_at,
            price: show.price,
            created_at: Utc::now(),
        };

        let seats = seat_grid()
            .into_iter()
            .map(|(label, seat_row, seat_col)| {
                state.next_seat += 1;
                Seat {
                    id: state.next_seat,
                    show_id: created.id,
                    label,
                    seat_row,
                    seat_col,
                    status: SeatStatus::Available,
                    booking_id: None,
                    hold_user: None,
                    hold_expires_at: None,
                }
            })
            .collect();

        state.seats.insert(created.id, seats);
        state.shows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn show(&self, show_id: i64) -> Result<Option<Show>, AppError> {
        let state = self.state.lock().await;
        Ok(state.shows.get(&show_id).cloned())
    }

    async fn list_shows(&self) -> Result<Vec<Show>, AppError> {
        let state = self.state.lock().await;
        let now = Utc::now();
        let mut shows: Vec<Show> = state
            .shows
            .values()
            .filter(|s| s.starts_at > now)
            .cloned()
            .collect();
        shows.sort_by_key(|s| s.starts_at);
        Ok(shows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future_show() -> NewShow {
        NewShow {
            movie_title: "Interstellar".to_string(),
            screen: "IMAX 1".to_string(),
            starts_at: Utc::now() + Duration::hours(4),
            price: 250.0,
        }
    }

    #[tokio::test]
    async fn create_show_seeds_full_grid() {
        let ledger = MemorySeatLedger::new();
        let show = ledger.create_show(future_show()).await.unwrap();
        let seats = ledger.list_seats(show.id).await.unwrap();
        assert_eq!(seats.len(), 100);
        assert_eq!(seats[0].label, "A1");
        assert_eq!(seats[99].label, "J10");
        assert!(seats
            .iter()
            .all(|s| s.status == SeatStatus::Available && s.booking_id.is_none()));
    }

    #[tokio::test]
    async fn guarded_transition_only_moves_matching_seats() {
        let ledger = MemorySeatLedger::new();
        let show = ledger.create_show(future_show()).await.unwrap();
        let expires = Utc::now() + Duration::minutes(5);

        let moved = ledger
            .transition_seats(
                show.id,
                &["A1".to_string(), "A2".to_string()],
                &[SeatGuard::Available],
                SeatWrite::Blocked {
                    user_id: 1,
                    expires_at: expires,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved, vec!["A1".to_string(), "A2".to_string()]);

        // A1 уже занято другим пользователем
        let moved = ledger
            .transition_seats(
                show.id,
                &["A1".to_string(), "A3".to_string()],
                &[SeatGuard::Available, SeatGuard::BlockedBy(2)],
                SeatWrite::Blocked {
                    user_id: 2,
                    expires_at: expires,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved, vec!["A3".to_string()]);
    }

    #[tokio::test]
    async fn sweep_releases_only_lapsed_holds() {
        let ledger = MemorySeatLedger::new();
        let show = ledger.create_show(future_show()).await.unwrap();

        ledger
            .transition_seats(
                show.id,
                &["B1".to_string()],
                &[SeatGuard::Available],
                SeatWrite::Blocked {
                    user_id: 1,
                    expires_at: Utc::now() - Duration::seconds(1),
                },
            )
            .await
            .unwrap();
        ledger
            .transition_seats(
                show.id,
                &["B2".to_string()],
                &[SeatGuard::Available],
                SeatWrite::Blocked {
                    user_id: 1,
                    expires_at: Utc::now() + Duration::minutes(5),
                },
            )
            .await
            .unwrap();

        let report = ledger.sweep_expired().await.unwrap();
        assert_eq!(report.released, vec![(show.id, "B1".to_string())]);

        let seats = ledger
            .seats_by_labels(show.id, &["B1".to_string(), "B2".to_string()])
            .await
            .unwrap();
        assert_eq!(seats[0].status, SeatStatus::Available);
        assert_eq!(seats[1].status, SeatStatus::Blocked);
    }
}
