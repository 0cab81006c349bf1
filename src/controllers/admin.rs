use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AdminUser;
use crate::models::seat::{GRID_COLS, GRID_ROWS};
use crate::models::NewShow;
use crate::services::holds::run_sweep;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/shows", post(create_show))
        .route("/admin/sweep", post(trigger_sweep))
}

// POST /api/admin/shows
#[derive(Debug, Deserialize, Validate)]
struct CreateShowRequest {
    #[validate(length(min = 1, max = 200))]
    movie_title: String,
    #[validate(length(min = 1, max = 50))]
    screen: String,
    starts_at: DateTime<Utc>,
    #[validate(range(min = 0.01))]
    price: f64,
}

async fn create_show(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateShowRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let show = state
        .ledger
        .create_show(NewShow {
            movie_title: req.movie_title,
            screen: req.screen,
            starts_at: req.starts_at,
            price: req.price,
        })
        .await?;

    state.cache.invalidate_shows().await;

    info!(
        "🎬 Created show {} ({} on {})",
        show.id, show.movie_title, show.screen
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "show": show,
            "seats_created": GRID_ROWS * GRID_COLS,
        })),
    ))
}

// POST /api/admin/sweep
async fn trigger_sweep(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let report = run_sweep(&state).await?;
    Ok(Json(json!({ "released": report.len() })))
}
