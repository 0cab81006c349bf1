use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        match self.role {
            Role::Admin => Actor::Admin,
            Role::User => Actor::User(self.user_id),
        }
    }
}

// Claims токена. `sub` числовой id пользователя, `role` опциональна,
// по умолчанию обычный пользователь.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: usize,
}

/// Проверяет подпись и срок токена, достаёт пользователя.
pub fn verify_token(token: &str, secret: &str) -> Option<AuthUser> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    let user_id: i64 = data.claims.sub.parse().ok()?;
    let role = match data.claims.role.as_deref() {
        Some("admin") => Role::Admin,
        _ => Role::User,
    };
    Some(AuthUser { user_id, role })
}

// Bearer JWT extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        verify_token(token, &state.config.jwt.secret).ok_or(StatusCode::UNAUTHORIZED)
    }
}

// Обёртка для админских ручек
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(AdminUser(user))
    }
}

/// Заголовок Idempotency-Key. Отсутствие заголовка не ошибка, а вот
/// мусор вместо UUID отклоняем сразу.
#[derive(Debug)]
pub struct IdempotencyKey(pub Option<Uuid>);

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get("Idempotency-Key") else {
            return Ok(IdempotencyKey(None));
        };
        let raw = raw
            .to_str()
            .map_err(|_| AppError::validation("Idempotency-Key must be valid UTF-8"))?;
        let key = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::validation("Idempotency-Key must be a UUID"))?;
        Ok(IdempotencyKey(Some(key)))
    }
}
