use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::controllers::json_response;
use crate::error::AppError;
use crate::models::{SeatStatus, Show};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows", get(list_shows))
        .route("/shows/{show_id}", get(get_show))
}

// GET /api/shows
async fn list_shows(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    // 1. Пытаемся отдать афишу из кеша
    if let Ok(Some(cached)) = state.cache.get_cached_shows().await {
        return Ok(json_response(cached, "HIT"));
    }

    // 2. Cache miss: идём в хранилище
    let shows = state.ledger.list_shows().await?;
    let payload = json!({
        "shows": shows,
        "count": shows.len(),
    });

    // 3. Сериализуем и кладём в кеш
    if let Ok(json_str) = serde_json::to_string(&payload) {
        if let Err(e) = state.cache.cache_shows(&json_str).await {
            tracing::warn!("Failed to cache shows: {:?}", e);
        }
        return Ok(json_response(json_str, "MISS"));
    }

    // Fallback на случай ошибки сериализации
    Ok(Json(payload).into_response())
}

// GET /api/shows/{show_id}
#[derive(Debug, Serialize)]
struct ShowDetail {
    #[serde(flatten)]
    show: Show,
    seats_total: usize,
    seats_available: usize,
    seats_blocked: usize,
    seats_booked: usize,
}

async fn get_show(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let show = state
        .ledger
        .show(show_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("show {} not found", show_id)))?;

    let seats = state.ledger.list_seats(show_id).await?;
    let now = Utc::now();
    let mut available = 0;
    let mut blocked = 0;
    let mut booked = 0;
    for seat in &seats {
        // истёкшие удержания считаем свободными
        match seat.effective_status(now) {
            SeatStatus::Available => available += 1,
            SeatStatus::Blocked => blocked += 1,
            SeatStatus::Booked => booked += 1,
        }
    }

    Ok(Json(ShowDetail {
        show,
        seats_total: seats.len(),
        seats_available: available,
        seats_blocked: blocked,
        seats_booked: booked,
    }))
}
