use crate::cache::CacheService;
use redis::AsyncCommands;
use tracing::info;

fn seats_key(show_id: i64) -> String {
    format!("seats:{}", show_id)
}

impl CacheService {
    /// Получает закешированную карту мест сеанса.
    pub async fn get_cached_seats(&self, show_id: i64) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(seats_key(show_id)).await
    }

    /// Сохраняет карту мест. TTL короткий: карта меняется каждым
    /// удержанием и выкупом.
    pub async fn cache_seats(&self, show_id: i64, value: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(seats_key(show_id), value, self.ttl.seats_ttl_seconds)
            .await
    }

    /// Сбрасывает карту мест после любой мутации. Ошибки Redis здесь не
    /// фатальны, запись и так умрёт по TTL.
    pub async fn invalidate_seats(&self, show_id: i64) {
        let mut conn = self.redis.conn.clone();
        let result: Result<i64, _> = conn.del(seats_key(show_id)).await;
        if let Ok(deleted) = result {
            if deleted > 0 {
                info!("Invalidated seat map cache for show {}", show_id);
            }
        }
    }
}
