use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub holds: HoldConfig,
    pub cache: CacheConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    /// Таймаут запроса на каждое соединение. Зависший условный UPDATE
    /// должен вернуться ошибкой, а не сидеть на блокировках строк.
    pub statement_timeout_ms: u64,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

// Настройки временных блокировок мест
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub hold_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

// TTL кешей
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub seats_ttl_seconds: u64,
    pub shows_ttl_seconds: u64,
    pub idempotency_ttl_seconds: u64,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Включено: выкуп забирает только свободные места и собственные
    /// удержания покупателя. Выключено: живое чужое удержание
    /// проигрывает выкупу.
    pub strict_hold_capture: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
                statement_timeout_ms: env::var("DB_STATEMENT_TIMEOUT_MS")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .expect("DB_STATEMENT_TIMEOUT_MS must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            },
            holds: HoldConfig {
                hold_ttl_seconds: env::var("HOLD_TTL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("HOLD_TTL_SECONDS must be a valid number"),
                sweep_interval_seconds: env::var("SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("SWEEP_INTERVAL_SECONDS must be a valid number"),
            },
            cache: CacheConfig {
                seats_ttl_seconds: env::var("SEATS_CACHE_TTL_SECONDS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("SEATS_CACHE_TTL_SECONDS must be a valid number"),
                shows_ttl_seconds: env::var("SHOWS_CACHE_TTL_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("SHOWS_CACHE_TTL_SECONDS must be a valid number"),
                idempotency_ttl_seconds: env::var("IDEMPOTENCY_TTL_SECONDS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .expect("IDEMPOTENCY_TTL_SECONDS must be a valid number"),
            },
            features: FeatureFlags {
                strict_hold_capture: env::var("STRICT_HOLD_CAPTURE")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .expect("STRICT_HOLD_CAPTURE must be true or false"),
            },
        }
    }
}
