use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Pool, Postgres,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Владеющая обёртка над пулом Postgres. Создаётся один раз на старте,
/// живёт внутри хранилища, закрывается явно при остановке.
#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(
        database_url: &str,
        pool_size: u32,
        statement_timeout_ms: u64,
    ) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(database_url)?
            .options([("statement_timeout", statement_timeout_ms.to_string())]);

        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    /// Закрывает пул: запросы в полёте доезжают, новые соединения не выдаются.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Postgres pool closed");
    }
}
