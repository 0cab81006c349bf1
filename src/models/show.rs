use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Show {
    pub id: i64,
    pub movie_title: String,
    pub screen: String,
    pub starts_at: DateTime<Utc>,
    /// Цена одного места
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Входные данные нового сеанса вместе с его сеткой мест.
#[derive(Debug, Clone)]
pub struct NewShow {
    pub movie_title: String,
    pub screen: String,
    pub starts_at: DateTime<Utc>,
    pub price: f64,
}
