use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::controllers::json_response;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{Seat, SeatStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows/{show_id}/seats", get(get_seats))
        .route("/seats/block", post(block_seat))
        .route("/seats/release", post(release_seat))
}

/* ---------- SEAT MAP ---------- */

// Публичная карта мест. Владельцев удержаний наружу не отдаём.
#[derive(Debug, Serialize)]
struct SeatView {
    label: String,
    row: i32,
    number: i32,
    status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    hold_expires_at: Option<DateTime<Utc>>,
}

impl SeatView {
    fn from_seat(seat: &Seat, now: DateTime<Utc>) -> Self {
        let status = seat.effective_status(now);
        SeatView {
            label: seat.label.clone(),
            row: seat.seat_row,
            number: seat.seat_col,
            status,
            hold_expires_at: if status == SeatStatus::Blocked {
                seat.hold_expires_at
            } else {
                None
            },
        }
    }
}

// GET /api/shows/{show_id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> Result<Response, AppError> {
    if let Ok(Some(cached)) = state.cache.get_cached_seats(show_id).await {
        return Ok(json_response(cached, "HIT"));
    }

    if state.ledger.show(show_id).await?.is_none() {
        return Err(AppError::not_found(format!("show {} not found", show_id)));
    }

    let seats = state.ledger.list_seats(show_id).await?;
    let now = Utc::now();
    let view: Vec<SeatView> = seats.iter().map(|s| SeatView::from_seat(s, now)).collect();
    let payload = json!({
        "show_id": show_id,
        "seats": view,
    });

    if let Ok(json_str) = serde_json::to_string(&payload) {
        if let Err(e) = state.cache.cache_seats(show_id, &json_str).await {
            tracing::warn!("Failed to cache seats for show {}: {:?}", show_id, e);
        }
        return Ok(json_response(json_str, "MISS"));
    }

    Ok(Json(payload).into_response())
}

/* ---------- HOLDS ---------- */

// POST /api/seats/block
#[derive(Debug, Deserialize, Validate)]
struct BlockSeatRequest {
    #[validate(range(min = 1))]
    show_id: i64,
    #[validate(length(min = 2, max = 4))]
    seat_label: String,
}

async fn block_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<BlockSeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let expires_at = state
        .holds
        .block(user.user_id, req.show_id, &req.seat_label)
        .await?;

    state.cache.invalidate_seats(req.show_id).await;

    Ok(Json(json!({
        "message": "Seat blocked",
        "expires_at": expires_at,
    })))
}

// POST /api/seats/release
#[derive(Debug, Deserialize, Validate)]
struct ReleaseSeatRequest {
    #[validate(range(min = 1))]
    show_id: i64,
    #[validate(length(min = 2, max = 4))]
    seat_label: String,
}

async fn release_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ReleaseSeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let released = state
        .holds
        .release(user.actor(), req.show_id, &req.seat_label)
        .await?;

    if released {
        state.cache.invalidate_seats(req.show_id).await;
    }

    Ok(Json(json!({ "released": released })))
}
