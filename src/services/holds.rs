use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::error::AppError;
use crate::ledger::{Actor, SeatGuard, SeatLedger, SeatWrite, SweepReport};
use crate::models::seat::parse_label;
use crate::models::SeatEvent;
use crate::AppState;

/// Временные удержания мест. Каждое удержание живёт `ttl` и либо
/// выкупается, либо отпускается, либо истекает.
#[derive(Clone)]
pub struct HoldService {
    ledger: Arc<dyn SeatLedger>,
    events: broadcast::Sender<SeatEvent>,
    ttl: Duration,
}

impl HoldService {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        events: broadcast::Sender<SeatEvent>,
        hold_ttl_seconds: i64,
    ) -> Self {
        Self {
            ledger,
            events,
            ttl: Duration::seconds(hold_ttl_seconds),
        }
    }

    /// Ставит или продлевает удержание. Повторный блок своего живого
    /// удержания сдвигает срок; истёкшее удержание считается свободным
    /// и достаётся любому желающему.
    pub async fn block(
        &self,
        user_id: i64,
        show_id: i64,
        seat_label: &str,
    ) -> Result<DateTime<Utc>, AppError> {
        if parse_label(seat_label).is_none() {
            return Err(AppError::validation(format!(
                "unknown seat label: {}",
                seat_label
            )));
        }
        // несуществующий сеанс это ошибка входа, а не 404
        if self.ledger.show(show_id).await?.is_none() {
            return Err(AppError::validation(format!("unknown show: {}", show_id)));
        }

        let expires_at = Utc::now() + self.ttl;
        let labels = [seat_label.to_string()];
        let moved = self
            .ledger
            .transition_seats(
                show_id,
                &labels,
                &[SeatGuard::Available, SeatGuard::BlockedBy(user_id)],
                SeatWrite::Blocked {
                    user_id,
                    expires_at,
                },
            )
            .await?;

        if moved.is_empty() {
            return Err(self.diagnose_block_failure(show_id, seat_label, user_id).await?);
        }

        info!(
            "🔒 User {} holds seat {} for show {} until {}",
            user_id, seat_label, show_id, expires_at
        );
        self.emit(SeatEvent::Blocked {
            show_id,
            seat_label: seat_label.to_string(),
            expires_at,
        });
        Ok(expires_at)
    }

    /// Снимает удержание. Владелец снимает своё, админ любое. Снятие
    /// уже свободного места ничего не делает и возвращает `Ok(false)`.
    pub async fn release(
        &self,
        actor: Actor,
        show_id: i64,
        seat_label: &str,
    ) -> Result<bool, AppError> {
        if parse_label(seat_label).is_none() {
            return Err(AppError::validation(format!(
                "unknown seat label: {}",
                seat_label
            )));
        }
        if self.ledger.show(show_id).await?.is_none() {
            return Err(AppError::validation(format!("unknown show: {}", show_id)));
        }

        let guards = match actor {
            Actor::User(user_id) => vec![SeatGuard::BlockedBy(user_id)],
            Actor::Admin => vec![SeatGuard::Blocked],
        };
        let labels = [seat_label.to_string()];
        let moved = self
            .ledger
            .transition_seats(show_id, &labels, &guards, SeatWrite::Available)
            .await?;

        if moved.is_empty() {
            let seats = self.ledger.seats_by_labels(show_id, &labels).await?;
            let Some(seat) = seats.first() else {
                return Err(AppError::validation(format!(
                    "unknown seat label: {}",
                    seat_label
                )));
            };
            let now = Utc::now();
            if SeatGuard::Booked.matches(seat, now) {
                return Err(AppError::conflict(
                    format!("seat {} is booked, cancel the booking instead", seat_label),
                    vec![seat_label.to_string()],
                ));
            }
            if seat.hold_live(now) {
                // сюда попадает только чужое живое удержание
                return Err(AppError::conflict(
                    format!("seat {} is held by another user", seat_label),
                    vec![seat_label.to_string()],
                ));
            }
            // уже свободно или удержание истекло
            return Ok(false);
        }

        info!(
            "🔓 Seat {} for show {} released by {:?}",
            seat_label, show_id, actor
        );
        self.emit(SeatEvent::Released {
            show_id,
            seat_label: seat_label.to_string(),
        });
        Ok(true)
    }

    /// Пакетно снимает все истёкшие удержания по всем сеансам.
    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let report = self.ledger.sweep_expired().await?;
        for (show_id, seat_label) in &report.released {
            self.emit(SeatEvent::HoldExpired {
                show_id: *show_id,
                seat_label: seat_label.clone(),
            });
        }
        if !report.is_empty() {
            info!("🧹 Released {} expired holds", report.len());
        }
        Ok(report)
    }

    async fn diagnose_block_failure(
        &self,
        show_id: i64,
        seat_label: &str,
        user_id: i64,
    ) -> Result<AppError, AppError> {
        let labels = [seat_label.to_string()];
        let seats = self.ledger.seats_by_labels(show_id, &labels).await?;
        let Some(seat) = seats.first() else {
            return Ok(AppError::validation(format!(
                "unknown seat label: {}",
                seat_label
            )));
        };
        let now = Utc::now();
        if SeatGuard::Booked.matches(seat, now) {
            return Ok(AppError::conflict(
                format!("seat {} is already booked", seat_label),
                vec![seat_label.to_string()],
            ));
        }
        if seat.hold_live(now) && seat.hold_user != Some(user_id) {
            return Ok(AppError::conflict(
                format!("seat {} is held by another user", seat_label),
                vec![seat_label.to_string()],
            ));
        }
        // место освободилось между проверкой и снимком
        Ok(AppError::conflict(
            format!("seat {} is temporarily unavailable, retry", seat_label),
            vec![seat_label.to_string()],
        ))
    }

    fn emit(&self, event: SeatEvent) {
        // нет подписчиков - не ошибка
        let _ = self.events.send(event);
    }
}

/// Один проход фоновой уборки: снять истёкшие удержания и сбросить
/// кэш карт мест затронутых сеансов.
pub async fn run_sweep(state: &Arc<AppState>) -> Result<SweepReport, AppError> {
    let report = state.holds.sweep().await?;
    for show_id in report.shows() {
        state.cache.invalidate_seats(show_id).await;
    }
    Ok(report)
}

/// Цикл уборки, запускается при старте. Ошибки логируются, цикл
/// продолжается: временный сбой базы не должен убить уборщика.
pub async fn sweep_loop(state: Arc<AppState>) {
    let interval = std::time::Duration::from_secs(state.config.holds.sweep_interval_seconds);
    loop {
        if let Err(e) = run_sweep(&state).await {
            error!("Hold sweep failed: {}", e);
        }
        tokio::time::sleep(interval).await;
    }
}
