use crate::cache::CacheService;
use redis::AsyncCommands;
use uuid::Uuid;

fn idempotency_key(user_id: i64, key: &Uuid) -> String {
    // ключ привязан к пользователю: чужой Idempotency-Key не отдаст чужую бронь
    format!("idempotency:{}:{}", user_id, key)
}

impl CacheService {
    /// Возвращает сохранённый ответ на повтор запроса с тем же ключом.
    pub async fn get_idempotent_response(
        &self,
        user_id: i64,
        key: &Uuid,
    ) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.get(idempotency_key(user_id, key)).await
    }

    /// Запоминает успешный ответ на сутки.
    pub async fn store_idempotent_response(
        &self,
        user_id: i64,
        key: &Uuid,
        value: &str,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        conn.set_ex(
            idempotency_key(user_id, key),
            value,
            self.ttl.idempotency_ttl_seconds,
        )
        .await
    }
}
