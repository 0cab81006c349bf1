//! Реестр мест: долговечная запись состояния каждого места сеанса.
//!
//! Все мутации идут через охраняемые групповые переходы, так что
//! проверка и запись выполняются одним атомарным действием хранилища.
//! Бэкенда два: Postgres для продакшена и память для тестов и
//! локального запуска без инфраструктуры.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{BookingWithSeats, NewShow, Seat, SeatStatus, Show};

pub use memory::MemorySeatLedger;
pub use pg::PgSeatLedger;

/// Ожидаемое текущее состояние места, проверяется атомарно внутри
/// условного UPDATE. Истёкшее удержание везде считается `Available`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatGuard {
    /// Свободно, включая места с истёкшим удержанием.
    Available,
    /// Живое удержание, чьё угодно.
    Blocked,
    /// Живое удержание именно этого пользователя.
    BlockedBy(i64),
    Booked,
    /// Выкуплено в рамках этой брони.
    BookedBy(i64),
}

impl SeatGuard {
    /// Тот же предикат, что SQL-бэкенд рендерит в WHERE, но для памяти.
    pub fn matches(&self, seat: &Seat, now: DateTime<Utc>) -> bool {
        match *self {
            SeatGuard::Available => seat.effective_status(now) == SeatStatus::Available,
            SeatGuard::Blocked => seat.hold_live(now),
            SeatGuard::BlockedBy(user_id) => {
                seat.hold_live(now) && seat.hold_user == Some(user_id)
            }
            SeatGuard::Booked => seat.status == SeatStatus::Booked,
            SeatGuard::BookedBy(booking_id) => {
                seat.status == SeatStatus::Booked && seat.booking_id == Some(booking_id)
            }
        }
    }
}

/// Целевое состояние охраняемого перехода.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeatWrite {
    /// Обнуляет поля удержания и брони.
    Available,
    Blocked {
        user_id: i64,
        expires_at: DateTime<Utc>,
    },
    Booked {
        booking_id: i64,
    },
}

/// Кто действует. Для `Admin` проверки владельца пропускаются.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(i64),
    Admin,
}

/// Всё, что нужно хранилищу для выкупа одной транзакцией. Слой
/// сервисов уже проверил метки и сверил сумму.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub user_id: i64,
    pub show_id: i64,
    pub labels: Vec<String>,
    pub total_amount: f64,
    /// Какие текущие состояния выкуп имеет право захватить.
    pub capture: Vec<SeatGuard>,
}

/// Истёкшие удержания, снятые одним проходом уборки, пары (show_id, label).
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub released: Vec<(i64, String)>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }

    pub fn len(&self) -> usize {
        self.released.len()
    }

    /// Уникальные сеансы, задетые уборкой, для сброса кеша.
    pub fn shows(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.released.iter().map(|(show_id, _)| *show_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Все места сеанса, упорядоченные по ряду, затем по колонке.
    async fn list_seats(&self, show_id: i64) -> Result<Vec<Seat>, AppError>;

    /// Из запрошенных меток возвращаются существующие; несуществующих
    /// просто нет в ответе.
    async fn seats_by_labels(
        &self,
        show_id: i64,
        labels: &[String],
    ) -> Result<Vec<Seat>, AppError>;

    /// Групповой compare-and-swap: одним атомарным действием хранилища
    /// переводит в `to` каждое перечисленное место, чьё текущее
    /// состояние подходит под один из `from`. Возвращает метки, которые
    /// реально перешли.
    async fn transition_seats(
        &self,
        show_id: i64,
        labels: &[String],
        from: &[SeatGuard],
        to: SeatWrite,
    ) -> Result<Vec<String>, AppError>;

    /// Освобождает каждое место с истёкшим удержанием. Идемпотентно,
    /// безопасно при любой параллельной активности.
    async fn sweep_expired(&self) -> Result<SweepReport, AppError>;

    /// Выкуп всё-или-ничего: в одной транзакции создаёт бронь и
    /// захватывает все запрошенные места, либо не меняет ничего.
    async fn commit_booking(&self, draft: BookingDraft) -> Result<BookingWithSeats, AppError>;

    /// Откатывает подтверждённую бронь: в одной транзакции переводит её
    /// в cancelled и возвращает места в available. Условный UPDATE
    /// статуса превращает повторную отмену в `AlreadyCancelled`.
    async fn cancel_booking(
        &self,
        booking_id: i64,
        actor: Actor,
    ) -> Result<BookingWithSeats, AppError>;

    async fn booking(&self, booking_id: i64) -> Result<Option<BookingWithSeats>, AppError>;

    async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<BookingWithSeats>, AppError>;

    /// Вставляет сеанс и засевает полную сетку мест одной транзакцией.
    async fn create_show(&self, show: NewShow) -> Result<Show, AppError>;

    async fn show(&self, show_id: i64) -> Result<Option<Show>, AppError>;

    /// Предстоящие сеансы по времени начала.
    async fn list_shows(&self) -> Result<Vec<Show>, AppError>;
}
