pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::ledger::SeatLedger;
use crate::models::SeatEvent;
use crate::services::{BookingService, HoldService};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub db: database::Database,
    /// Хранилище мест. Собирается один раз на старте, всюду передаётся
    /// как трейт-объект и закрывается вместе с [`database::Database`]
    /// при остановке. Ниже этой структуры своё хранилище никто не создаёт.
    pub ledger: Arc<dyn SeatLedger>,
    pub cache: cache::CacheService,
    pub holds: HoldService,
    pub bookings: BookingService,
    // Шина событий по местам для WebSocket подписчиков
    pub seat_events: broadcast::Sender<SeatEvent>,
}
