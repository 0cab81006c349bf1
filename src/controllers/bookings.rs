use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::{AuthUser, IdempotencyKey};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings))
        .route("/bookings", post(create_booking))
        .route("/bookings/{booking_id}", get(get_booking))
        .route("/bookings/{booking_id}/cancel", post(cancel_booking))
}

/* ---------- helpers ---------- */

fn created_json(body: String, replay: bool) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header("Content-Type", "application/json");
    if replay {
        builder = builder.header("X-Idempotent-Replay", "true");
    }
    builder.body(Body::from(body)).unwrap()
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
struct CreateBookingRequest {
    #[validate(range(min = 1))]
    show_id: i64,
    #[validate(length(min = 1, max = 10))]
    seat_labels: Vec<String>,
    #[validate(range(min = 0.0))]
    total_amount: f64,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    idempotency: IdempotencyKey,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Response, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    // Повтор с тем же ключом не трогает места, отдаём сохранённый ответ
    if let IdempotencyKey(Some(key)) = &idempotency {
        match state.cache.get_idempotent_response(user.user_id, key).await {
            Ok(Some(cached)) => return Ok(created_json(cached, true)),
            Ok(None) => {}
            // кеш недоступен: бронируем как обычно, без защиты от повтора
            Err(e) => tracing::warn!("Idempotency lookup failed: {:?}", e),
        }
    }

    let booked = state
        .bookings
        .book(user.user_id, req.show_id, &req.seat_labels, req.total_amount)
        .await?;

    state.cache.invalidate_seats(req.show_id).await;

    match serde_json::to_string(&booked) {
        Ok(json_str) => {
            if let IdempotencyKey(Some(key)) = &idempotency {
                if let Err(e) = state
                    .cache
                    .store_idempotent_response(user.user_id, key, &json_str)
                    .await
                {
                    tracing::warn!("Failed to store idempotent response: {:?}", e);
                }
            }
            Ok(created_json(json_str, false))
        }
        // Fallback на случай ошибки сериализации
        Err(_) => Ok((StatusCode::CREATED, Json(booked)).into_response()),
    }
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.bookings.history(user.user_id).await?;
    Ok(Json(json!({
        "bookings": bookings,
        "count": bookings.len(),
    })))
}

// GET /api/bookings/{booking_id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.bookings.detail(booking_id, user.actor()).await?;
    Ok(Json(booking))
}

// POST /api/bookings/{booking_id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let cancelled = state.bookings.cancel(booking_id, user.actor()).await?;

    state.cache.invalidate_seats(cancelled.booking.show_id).await;

    Ok(Json(json!({
        "message": "Booking cancelled",
        "booking_id": booking_id,
        "seats_released": cancelled.seats,
    })))
}
