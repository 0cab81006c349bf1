use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::error::AppError;
use crate::ledger::{Actor, BookingDraft, SeatGuard, SeatLedger};
use crate::models::seat::parse_label;
use crate::models::{BookingWithSeats, SeatEvent};

/// Жёсткий потолок на размер одной брони.
pub const MAX_SEATS_PER_BOOKING: usize = 10;

/// Допуск при сверке суммы, гасит двоичный шум умножения.
const AMOUNT_TOLERANCE: f64 = 0.01;

/// Выкуп и отмена броней. Выкуп атомарный: либо все места из запроса
/// переходят в booked, либо ни одно.
#[derive(Clone)]
pub struct BookingService {
    ledger: Arc<dyn SeatLedger>,
    events: broadcast::Sender<SeatEvent>,
    /// Если включено, выкуп забирает только свободные места и свои
    /// удержания. По умолчанию выключено: оплата сильнее живого чужого
    /// удержания.
    strict_hold_capture: bool,
}

impl BookingService {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        events: broadcast::Sender<SeatEvent>,
        strict_hold_capture: bool,
    ) -> Self {
        Self {
            ledger,
            events,
            strict_hold_capture,
        }
    }

    pub async fn book(
        &self,
        user_id: i64,
        show_id: i64,
        seat_labels: &[String],
        total_amount: f64,
    ) -> Result<BookingWithSeats, AppError> {
        if seat_labels.is_empty() {
            return Err(AppError::validation("no seats requested"));
        }
        if seat_labels.len() > MAX_SEATS_PER_BOOKING {
            return Err(AppError::validation(format!(
                "at most {} seats per booking",
                MAX_SEATS_PER_BOOKING
            )));
        }
        let unique: HashSet<&String> = seat_labels.iter().collect();
        if unique.len() != seat_labels.len() {
            return Err(AppError::validation("duplicate seat labels in request"));
        }
        for label in seat_labels {
            if parse_label(label).is_none() {
                return Err(AppError::validation(format!(
                    "unknown seat label: {}",
                    label
                )));
            }
        }

        // несуществующий сеанс это ошибка входа, а не 404
        let show = self
            .ledger
            .show(show_id)
            .await?
            .ok_or_else(|| AppError::validation(format!("unknown show: {}", show_id)))?;

        let expected = show.price * seat_labels.len() as f64;
        if (total_amount - expected).abs() > AMOUNT_TOLERANCE {
            return Err(AppError::validation(format!(
                "total amount {:.2} does not match expected {:.2}",
                total_amount, expected
            )));
        }

        let capture = if self.strict_hold_capture {
            vec![SeatGuard::Available, SeatGuard::BlockedBy(user_id)]
        } else {
            vec![SeatGuard::Available, SeatGuard::Blocked]
        };

        let result = self
            .ledger
            .commit_booking(BookingDraft {
                user_id,
                show_id,
                labels: seat_labels.to_vec(),
                total_amount,
                capture,
            })
            .await?;

        info!(
            "🎫 User {} booked {} seats for show {} (booking {})",
            user_id,
            result.seats.len(),
            show_id,
            result.booking.id
        );
        for seat_label in &result.seats {
            self.emit(SeatEvent::Booked {
                show_id,
                seat_label: seat_label.clone(),
            });
        }
        Ok(result)
    }

    pub async fn cancel(
        &self,
        booking_id: i64,
        actor: Actor,
    ) -> Result<BookingWithSeats, AppError> {
        let result = self.ledger.cancel_booking(booking_id, actor).await?;

        info!(
            "🎫 Booking {} cancelled, {} seats released",
            booking_id,
            result.seats.len()
        );
        for seat_label in &result.seats {
            self.emit(SeatEvent::Released {
                show_id: result.booking.show_id,
                seat_label: seat_label.clone(),
            });
        }
        Ok(result)
    }

    pub async fn history(&self, user_id: i64) -> Result<Vec<BookingWithSeats>, AppError> {
        self.ledger.bookings_for_user(user_id).await
    }

    pub async fn detail(
        &self,
        booking_id: i64,
        actor: Actor,
    ) -> Result<BookingWithSeats, AppError> {
        let found = self
            .ledger
            .booking(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("booking {} not found", booking_id)))?;
        if let Actor::User(user_id) = actor {
            // чужие брони не раскрываем
            if found.booking.user_id != user_id {
                return Err(AppError::not_found(format!(
                    "booking {} not found",
                    booking_id
                )));
            }
        }
        Ok(found)
    }

    fn emit(&self, event: SeatEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemorySeatLedger;
    use crate::models::NewShow;
    use chrono::{Duration, Utc};

    fn service() -> (BookingService, Arc<dyn SeatLedger>) {
        let ledger: Arc<dyn SeatLedger> = Arc::new(MemorySeatLedger::new());
        let (tx, _) = broadcast::channel(64);
        (BookingService::new(ledger.clone(), tx, false), ledger)
    }

    async fn seeded_show(ledger: &Arc<dyn SeatLedger>) -> i64 {
        ledger
            .create_show(NewShow {
                movie_title: "Arrival".to_string(),
                screen: "Screen 1".to_string(),
                starts_at: Utc::now() + Duration::hours(3),
                price: 200.0,
            })
            .await
            .unwrap()
            .id
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rejects_duplicate_labels() {
        let (bookings, ledger) = service();
        let show_id = seeded_show(&ledger).await;
        let err = bookings
            .book(1, show_id, &labels(&["A1", "A1"]), 400.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_request() {
        let (bookings, ledger) = service();
        let show_id = seeded_show(&ledger).await;
        let eleven: Vec<String> = (1..=10)
            .map(|c| format!("A{}", c))
            .chain(std::iter::once("B1".to_string()))
            .collect();
        let err = bookings
            .book(1, show_id, &eleven, 2200.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_amount_mismatch() {
        let (bookings, ledger) = service();
        let show_id = seeded_show(&ledger).await;
        let err = bookings
            .book(1, show_id, &labels(&["A1", "A2"]), 350.0)
            .await
            .unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("400.00"), "got: {}", msg),
            other => panic!("expected validation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn accepts_amount_within_tolerance() {
        let (bookings, ledger) = service();
        let show_id = seeded_show(&ledger).await;
        let booked = bookings
            .book(1, show_id, &labels(&["A1", "A2"]), 400.004)
            .await
            .unwrap();
        assert_eq!(booked.seats.len(), 2);
    }

    #[tokio::test]
    async fn unknown_show_fails_validation() {
        let (bookings, _) = service();
        let err = bookings
            .book(1, 42, &labels(&["A1"]), 200.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
