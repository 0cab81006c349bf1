use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Ошибки ядра бронирования. Их возвращают сервисы и хранилище мест;
/// отображение в HTTP живёт только в `into_response`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// Запрошенный переход проиграл текущему состоянию мест. В `seats`
    /// лежат виновные метки, когда они известны.
    #[error("{message}")]
    Conflict {
        message: String,
        seats: Vec<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>, seats: Vec<String>) -> Self {
        AppError::Conflict {
            message: msg.into(),
            seats,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Conflict { message, seats } => {
                let body = if seats.is_empty() {
                    json!({ "error": message })
                } else {
                    json!({ "error": message, "seats": seats })
                };
                (StatusCode::CONFLICT, body)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::AlreadyCancelled => (
                StatusCode::CONFLICT,
                json!({ "error": "booking is already cancelled" }),
            ),
            AppError::Storage(e) => {
                tracing::error!("storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                AppError::conflict("taken", vec!["A1".into()]),
                StatusCode::CONFLICT,
            ),
            (AppError::not_found("nope"), StatusCode::NOT_FOUND),
            (AppError::AlreadyCancelled, StatusCode::CONFLICT),
            (
                AppError::Storage(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn conflict_message_keeps_seats() {
        let err = AppError::conflict("seats unavailable", vec!["A1".into(), "B2".into()]);
        match err {
            AppError::Conflict { message, seats } => {
                assert_eq!(message, "seats unavailable");
                assert_eq!(seats, vec!["A1".to_string(), "B2".to_string()]);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
