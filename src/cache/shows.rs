use crate::cache::CacheService;
use redis::AsyncCommands;

const SHOWS_KEY: &str = "shows:upcoming";

impl CacheService {
    /// Получает закешированную афишу предстоящих сеансов.
    pub async fn get_cached_shows(&self) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(SHOWS_KEY).await
    }

    /// Сохраняет афишу в кеш.
    pub async fn cache_shows(&self, value: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(SHOWS_KEY, value, self.ttl.shows_ttl_seconds).await
    }

    /// Сбрасывает афишу, вызывается при создании нового сеанса.
    pub async fn invalidate_shows(&self) {
        let mut conn = self.redis.conn.clone();
        let _: Result<i64, _> = conn.del(SHOWS_KEY).await;
    }
}
