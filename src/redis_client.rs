use redis::{aio::MultiplexedConnection, Client};

/// Тонкая обёртка над одним мультиплексированным соединением Redis.
/// Дёшево клонируется, общая для всех сабмодулей кеша. В работе кеш
/// переживает недоступность Redis, жёсткое требование одно: на старте
/// сервер обязан ответить.
#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        // Полуоткрытое соединение ловим на старте, а не на первом запросе
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(RedisClient { conn })
    }
}
