use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Фиксированный зал: ряды A..J, колонки 1..10.
pub const GRID_ROWS: i32 = 10;
pub const GRID_COLS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Blocked,
    Booked,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub show_id: i64,
    pub label: String,
    pub seat_row: i32,
    pub seat_col: i32,
    pub status: SeatStatus,
    pub booking_id: Option<i64>,
    pub hold_user: Option<i64>,
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl Seat {
    /// Статус глазами читателя: blocked с истёкшим удержанием
    /// считается available.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        match self.status {
            SeatStatus::Blocked if !self.hold_live(now) => SeatStatus::Available,
            other => other,
        }
    }

    /// Истина, пока удержание ещё действует. Удержание без срока
    /// считается истёкшим.
    pub fn hold_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Blocked
            && self.hold_expires_at.map(|t| t > now).unwrap_or(false)
    }
}

/// Каноническая метка позиции в сетке, например (1, 1) -> "A1".
pub fn seat_label(row: i32, col: i32) -> String {
    let letter = (b'A' + (row - 1) as u8) as char;
    format!("{}{}", letter, col)
}

/// Разбирает метку места обратно в (row, col). Принимаются только
/// канонические метки внутри сетки: "a1", "A01" и "K1" вернут None.
pub fn parse_label(label: &str) -> Option<(i32, i32)> {
    let mut chars = label.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_uppercase() {
        return None;
    }
    let row = (letter as u8 - b'A') as i32 + 1;
    let col: i32 = chars.as_str().parse().ok()?;
    if !(1..=GRID_ROWS).contains(&row) || !(1..=GRID_COLS).contains(&col) {
        return None;
    }
    // отклоняем неканоничные формы вроде "A01"
    if seat_label(row, col) != label {
        return None;
    }
    Some((row, col))
}

/// Полная сетка (label, row, col) для нового сеанса, построчно.
pub fn seat_grid() -> Vec<(String, i32, i32)> {
    let mut grid = Vec::with_capacity((GRID_ROWS * GRID_COLS) as usize);
    for row in 1..=GRID_ROWS {
        for col in 1..=GRID_COLS {
            grid.push((seat_label(row, col), row, col));
        }
    }
    grid
}

/// Изменение состояния места, рассылаемое живым подписчикам сеанса.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeatEvent {
    Blocked {
        show_id: i64,
        seat_label: String,
        expires_at: DateTime<Utc>,
    },
    Released {
        show_id: i64,
        seat_label: String,
    },
    Booked {
        show_id: i64,
        seat_label: String,
    },
    HoldExpired {
        show_id: i64,
        seat_label: String,
    },
}

impl SeatEvent {
    pub fn show_id(&self) -> i64 {
        match self {
            SeatEvent::Blocked { show_id, .. }
            | SeatEvent::Released { show_id, .. }
            | SeatEvent::Booked { show_id, .. }
            | SeatEvent::HoldExpired { show_id, .. } => *show_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn seat(status: SeatStatus, hold_expires_at: Option<DateTime<Utc>>) -> Seat {
        Seat {
            id: 1,
            show_id: 1,
            label: "A1".to_string(),
            seat_row: 1,
            seat_col: 1,
            status,
            booking_id: None,
            hold_user: Some(7),
            hold_expires_at,
        }
    }

    #[test]
    fn labels_cover_corners() {
        assert_eq!(seat_label(1, 1), "A1");
        assert_eq!(seat_label(1, 10), "A10");
        assert_eq!(seat_label(10, 1), "J1");
        assert_eq!(seat_label(10, 10), "J10");
    }

    #[test]
    fn parse_rejects_junk() {
        assert_eq!(parse_label(""), None);
        assert_eq!(parse_label("a1"), None);
        assert_eq!(parse_label("A0"), None);
        assert_eq!(parse_label("A11"), None);
        assert_eq!(parse_label("K1"), None);
        assert_eq!(parse_label("A01"), None);
        assert_eq!(parse_label("1A"), None);
        assert_eq!(parse_label("A1 "), None);
    }

    #[test]
    fn grid_is_complete_and_unique() {
        let grid = seat_grid();
        assert_eq!(grid.len(), 100);
        let labels: std::collections::HashSet<_> =
            grid.iter().map(|(l, _, _)| l.clone()).collect();
        assert_eq!(labels.len(), 100);
        assert_eq!(grid[0].0, "A1");
        assert_eq!(grid[99].0, "J10");
    }

    #[test]
    fn lapsed_hold_reads_available() {
        let now = Utc::now();
        let live = seat(SeatStatus::Blocked, Some(now + Duration::minutes(5)));
        let lapsed = seat(SeatStatus::Blocked, Some(now - Duration::seconds(1)));
        let boundary = seat(SeatStatus::Blocked, Some(now));
        assert_eq!(live.effective_status(now), SeatStatus::Blocked);
        assert_eq!(lapsed.effective_status(now), SeatStatus::Available);
        // истёкший ровно на границе уже не живой
        assert_eq!(boundary.effective_status(now), SeatStatus::Available);
    }

    #[test]
    fn blocked_without_expiry_is_not_live() {
        let now = Utc::now();
        let s = seat(SeatStatus::Blocked, None);
        assert!(!s.hold_live(now));
        assert_eq!(s.effective_status(now), SeatStatus::Available);
    }

    #[test]
    fn booked_ignores_hold_fields() {
        let now = Utc::now();
        let s = seat(SeatStatus::Booked, Some(now - Duration::minutes(1)));
        assert_eq!(s.effective_status(now), SeatStatus::Booked);
    }

    proptest! {
        #[test]
        fn label_round_trip(row in 1..=GRID_ROWS, col in 1..=GRID_COLS) {
            let label = seat_label(row, col);
            prop_assert_eq!(parse_label(&label), Some((row, col)));
        }

        #[test]
        fn parse_never_accepts_out_of_grid(row in 11..=26i32, col in 1..=GRID_COLS) {
            let label = seat_label(row, col);
            prop_assert_eq!(parse_label(&label), None);
        }
    }
}
