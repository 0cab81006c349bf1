pub mod admin;
pub mod bookings;
pub mod live;
pub mod seats;
pub mod shows;

use axum::{body::Body, response::Response, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(shows::routes())
        .merge(seats::routes())
        .merge(bookings::routes())
        .merge(admin::routes())
        .merge(live::routes())
}

// Готовый JSON с пометкой, откуда он пришёл
pub(crate) fn json_response(body: String, x_cache: &str) -> Response {
    Response::builder()
        .header("Content-Type", "application/json")
        .header("X-Cache", x_cache)
        .body(Body::from(body))
        .unwrap()
}
