use crate::config::CacheConfig;
use crate::redis_client::RedisClient;

pub mod idempotency;
pub mod seats;
pub mod shows;

/// Сервисный слой поверх Redis. Хранит уже сериализованные JSON ответы,
/// чтобы горячие GET отдавались без похода в Postgres.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    ttl: CacheConfig,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl: CacheConfig) -> Self {
        Self { redis, ttl }
    }
}
