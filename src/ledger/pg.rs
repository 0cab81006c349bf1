use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::database::Database;
use crate::error::AppError;
use crate::ledger::{Actor, BookingDraft, SeatGuard, SeatLedger, SeatWrite, SweepReport};
use crate::models::seat::seat_grid;
use crate::models::{Booking, BookingWithSeats, NewShow, Seat, Show};

/// Бэкенд на Postgres. Каждый охраняемый переход выполняется одним
/// условным UPDATE: гонки разрешает база, а не процесс, так что
/// несколько инстансов сервиса спокойно делят один кластер.
#[derive(Clone)]
pub struct PgSeatLedger {
    db: Database,
}

impl PgSeatLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/* ---------- SQL builder ---------- */

// Effective-state predicates. Must stay equivalent to SeatGuard::matches.
fn guard_clause(guard: &SeatGuard, next: &mut usize) -> String {
    match guard {
        SeatGuard::Available => {
            "(status = 'available' OR (status = 'blocked' \
             AND (hold_expires_at IS NULL OR hold_expires_at <= now())))"
                .to_string()
        }
        SeatGuard::Blocked => {
            "(status = 'blocked' AND hold_expires_at > now())".to_string()
        }
        SeatGuard::BlockedBy(_) => {
            let clause = format!(
                "(status = 'blocked' AND hold_expires_at > now() AND hold_user = ${})",
                *next
            );
            *next += 1;
            clause
        }
        SeatGuard::Booked => "(status = 'booked')".to_string(),
        SeatGuard::BookedBy(_) => {
            let clause = format!("(status = 'booked' AND booking_id = ${})", *next);
            *next += 1;
            clause
        }
    }
}

fn write_clause(to: &SeatWrite, next: &mut usize) -> String {
    match to {
        SeatWrite::Available => {
            "status = 'available', hold_user = NULL, hold_expires_at = NULL, booking_id = NULL"
                .to_string()
        }
        SeatWrite::Blocked { .. } => {
            let clause = format!(
                "status = 'blocked', hold_user = ${}, hold_expires_at = ${}, booking_id = NULL",
                *next,
                *next + 1
            );
            *next += 2;
            clause
        }
        SeatWrite::Booked { .. } => {
            let clause = format!(
                "status = 'booked', booking_id = ${}, hold_user = NULL, hold_expires_at = NULL",
                *next
            );
            *next += 1;
            clause
        }
    }
}

/// Собирает compare-and-swap одним запросом. $1 сеанс, $2 массив меток;
/// биндинги записи идут раньше биндингов условий, в текстовом порядке
/// самого запроса.
fn transition_sql(from: &[SeatGuard], to: &SeatWrite) -> String {
    let mut next = 3;
    let set = write_clause(to, &mut next);
    let guards: Vec<String> = from.iter().map(|g| guard_clause(g, &mut next)).collect();
    format!(
        "UPDATE seats SET {} WHERE show_id = $1 AND label = ANY($2) AND ({}) RETURNING label",
        set,
        guards.join(" OR ")
    )
}

async fn run_transition<'e, E>(
    executor: E,
    show_id: i64,
    labels: &[String],
    from: &[SeatGuard],
    to: &SeatWrite,
) -> Result<Vec<String>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    debug_assert!(!from.is_empty());
    let sql = transition_sql(from, to);

    let mut query = sqlx::query_scalar::<_, String>(&sql)
        .bind(show_id)
        .bind(labels.to_vec());

    match to {
        SeatWrite::Blocked {
            user_id,
            expires_at,
        } => {
            query = query.bind(*user_id).bind(*expires_at);
        }
        SeatWrite::Booked { booking_id } => {
            query = query.bind(*booking_id);
        }
        SeatWrite::Available => {}
    }
    for guard in from {
        match guard {
            SeatGuard::BlockedBy(user_id) => query = query.bind(*user_id),
            SeatGuard::BookedBy(booking_id) => query = query.bind(*booking_id),
            _ => {}
        }
    }

    query.fetch_all(executor).await
}

/* ---------- ledger impl ---------- */

#[async_trait]
impl SeatLedger for PgSeatLedger {
    async fn list_seats(&self, show_id: i64) -> Result<Vec<Seat>, AppError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, show_id, label, seat_row, seat_col, status, booking_id,
                    hold_user, hold_expires_at
             FROM seats
             WHERE show_id = $1
             ORDER BY seat_row, seat_col",
        )
        .bind(show_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn seats_by_labels(
        &self,
        show_id: i64,
        labels: &[String],
    ) -> Result<Vec<Seat>, AppError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, show_id, label, seat_row, seat_col, status, booking_id,
                    hold_user, hold_expires_at
             FROM seats
             WHERE show_id = $1 AND label = ANY($2)
             ORDER BY seat_row, seat_col",
        )
        .bind(show_id)
        .bind(labels.to_vec())
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn transition_seats(
        &self,
        show_id: i64,
        labels: &[String],
        from: &[SeatGuard],
        to: SeatWrite,
    ) -> Result<Vec<String>, AppError> {
        let moved = run_transition(&self.db.pool, show_id, labels, from, &to).await?;
        Ok(moved)
    }

    async fn sweep_expired(&self) -> Result<SweepReport, AppError> {
        let released: Vec<(i64, String)> = sqlx::query_as(
            "UPDATE seats
             SET status = 'available', hold_user = NULL, hold_expires_at = NULL
             WHERE status = 'blocked'
               AND (hold_expires_at IS NULL OR hold_expires_at <= now())
             RETURNING show_id, label",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(SweepReport { released })
    }

    async fn commit_booking(&self, draft: BookingDraft) -> Result<BookingWithSeats, AppError> {
        let now = Utc::now();
        let mut tx = self.db.pool.begin().await?;

        let seats: Vec<Seat> = sqlx::query_as(
            "SELECT id, show_id, label, seat_row, seat_col, status, booking_id,
                    hold_user, hold_expires_at
             FROM seats
             WHERE show_id = $1 AND label = ANY($2)",
        )
        .bind(draft.show_id)
        .bind(draft.labels.clone())
        .fetch_all(&mut *tx)
        .await?;

        if seats.len() != draft.labels.len() {
            let known: HashSet<&str> = seats.iter().map(|s| s.label.as_str()).collect();
            let missing: Vec<String> = draft
                .labels
                .iter()
                .filter(|l| !known.contains(l.as_str()))
                .cloned()
                .collect();
            tx.rollback().await?;
            return Err(AppError::validation(format!(
                "unknown seats: {}",
                missing.join(", ")
            )));
        }

        // Снимок для внятной ошибки; решает всё равно условный UPDATE ниже.
        let unavailable: Vec<String> = seats
            .iter()
            .filter(|s| !draft.capture.iter().any(|g| g.matches(s, now)))
            .map(|s| s.label.clone())
            .collect();
        if !unavailable.is_empty() {
            tx.rollback().await?;
            return Err(AppError::conflict("seats unavailable", unavailable));
        }

        let booking: Booking = sqlx::query_as(
            "INSERT INTO bookings (user_id, show_id, total_amount, status)
             VALUES ($1, $2, $3, 'confirmed')
             RETURNING id, user_id, show_id, total_amount, status, created_at, cancelled_at",
        )
        .bind(draft.user_id)
        .bind(draft.show_id)
        .bind(draft.total_amount)
        .fetch_one(&mut *tx)
        .await?;

        let captured = run_transition(
            &mut *tx,
            draft.show_id,
            &draft.labels,
            &draft.capture,
            &SeatWrite::Booked {
                booking_id: booking.id,
            },
        )
        .await?;

        if captured.len() != draft.labels.len() {
            let got: HashSet<&str> = captured.iter().map(String::as_str).collect();
            let lost: Vec<String> = draft
                .labels
                .iter()
                .filter(|l| !got.contains(l.as_str()))
                .cloned()
                .collect();
            tx.rollback().await?;
            return Err(AppError::conflict("seats were taken concurrently", lost));
        }

        tx.commit().await?;

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
        let mut tx = self.db.pool.begin().await?;

        let existing: Option<Booking> = sqlx::query_as(
            "SELECT id, user_id, show_id, total_amount, status, created_at, cancelled_at
             FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            tx.rollback().await?;
            return Err(AppError::not_found(format!("booking {} not found", booking_id)));
        };
        if let Actor::User(user_id) = actor {
            // чужие брони не раскрываем
            if existing.user_id != user_id {
                tx.rollback().await?;
                return Err(AppError::not_found(format!(
                    "booking {} not found",
                    booking_id
                )));
            }
        }

        // One conditional update; a concurrent double-cancel loses here.
        let booking: Option<Booking> = sqlx::query_as(
            "UPDATE bookings
             SET status = 'cancelled', cancelled_at = now()
             WHERE id = $1 AND status = 'confirmed'
             RETURNING id, user_id, show_id, total_amount, status, created_at, cancelled_at",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booking) = booking else {
            tx.rollback().await?;
            return Err(AppError::AlreadyCancelled);
        };

        let released: Vec<String> = sqlx::query_scalar(
            "UPDATE seats
             SET status = 'available', booking_id = NULL, hold_user = NULL, hold_expires_at = NULL
             WHERE booking_id = $1 AND status = 'booked'
             RETURNING label",
        )
        .bind(booking_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BookingWithSeats {
            booking,
            seats: released,
        })
    }

    async fn booking(&self, booking_id: i64) -> Result<Option<BookingWithSeats>, AppError> {
        let booking: Option<Booking> = sqlx::query_as(
            "SELECT id, user_id, show_id, total_amount, status, created_at, cancelled_at
             FROM bookings WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.db.pool)
        .await?;

        let Some(booking) = booking else {
            return Ok(None);
        };

        let seats: Vec<String> = sqlx::query_scalar(
            "SELECT label FROM seats WHERE booking_id = $1 ORDER BY seat_row, seat_col",
        )
        .bind(booking.id)
        .fetch_all(&self.db.pool)
        .await?;

        Ok(Some(BookingWithSeats { booking, seats }))
    }

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<BookingWithSeats>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.user_id, b.show_id, b.total_amount, b.status,
                   b.created_at, b.cancelled_at, s.label
            FROM bookings b
            LEFT JOIN seats s ON s.booking_id = b.id
            WHERE b.user_id = $1
            ORDER BY b.created_at DESC, b.id DESC, s.seat_row, s.seat_col
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        // строки одной брони идут подряд
        let mut out: Vec<BookingWithSeats> = Vec::new();
        for row in rows {
            let id: i64 = row.get("id");
            if out.last().map(|b| b.booking.id) != Some(id) {
                out.push(BookingWithSeats {
                    booking: Booking {
                        id,
                        user_id: row.get("user_id"),
                        show_id: row.get("show_id"),
                        total_amount: row.get("total_amount"),
                        status: row.get("status"),
                        created_at: row.get("created_at"),
                        cancelled_at: row.get("cancelled_at"),
                    },
                    seats: Vec::new(),
                });
            }
            if let (Some(current), Some(label)) =
                (out.last_mut(), row.get::<Option<String>, _>("label"))
            {
                current.seats.push(label);
            }
        }
        Ok(out)
    }

    async fn create_show(&self, show: NewShow) -> Result<Show, AppError> {
        let mut tx = self.db.pool.begin().await?;

        let created: Show = sqlx::query_as(
            "INSERT INTO shows (movie_title, screen, starts_at, price)
             VALUES ($1, $2, $3, $4)
             RETURNING id, movie_title, screen, starts_at, price, created_at",
        )
        .bind(&show.movie_title)
        .bind(&show.screen)
        .bind(show.starts_at)
        .bind(show.price)
        .fetch_one(&mut *tx)
        .await?;

        let grid = seat_grid();
        let labels: Vec<String> = grid.iter().map(|(l, _, _)| l.clone()).collect();
        let rows: Vec<i32> = grid.iter().map(|(_, r, _)| *r).collect();
        let cols: Vec<i32> = grid.iter().map(|(_, _, c)| *c).collect();

        sqlx::query(
            "INSERT INTO seats (show_id, label, seat_row, seat_col, status)
             SELECT $1, t.label, t.seat_row, t.seat_col, 'available'
             FROM unnest($2::text[], $3::int4[], $4::int4[]) AS t(label, seat_row, seat_col)",
        )
        .bind(created.id)
        .bind(labels)
        .bind(rows)
        .bind(cols)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn show(&self, show_id: i64) -> Result<Option<Show>, AppError> {
        let show = sqlx::query_as::<_, Show>(
            "SELECT id, movie_title, screen, starts_at, price, created_at
             FROM shows WHERE id = $1",
        )
        .bind(show_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(show)
    }

    async fn list_shows(&self) -> Result<Vec<Show>, AppError> {
        let shows = sqlx::query_as::<_, Show>(
            "SELECT id, movie_title, screen, starts_at, price, created_at
             FROM shows
             WHERE starts_at > now()
             ORDER BY starts_at",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(shows)
    }
}
