use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking::{
    cache::CacheService,
    config::Config,
    controllers,
    database::Database,
    ledger::{PgSeatLedger, SeatLedger},
    redis_client::RedisClient,
    services::{holds, BookingService, HoldService},
    AppState,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    if config.app.environment == "production" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting cinema booking service");

    // Connect to the database
    let db = Database::new(
        &config.database.url,
        config.database.pool_size,
        config.database.statement_timeout_ms,
    )
    .await?;
    info!("Database connected");

    // Run migrations
    db.run_migrations().await?;

    // Connect to Redis
    let redis = RedisClient::new(&config.redis.url).await?;
    info!("Redis connected");

    let cache = CacheService::new(redis, config.cache.clone());

    // Хранилище создаётся один раз, дальше живёт только за Arc
    let ledger: Arc<dyn SeatLedger> = Arc::new(PgSeatLedger::new(db.clone()));

    let (seat_events, _) = broadcast::channel(1024);

    let hold_service = HoldService::new(
        ledger.clone(),
        seat_events.clone(),
        config.holds.hold_ttl_seconds,
    );
    let booking_service = BookingService::new(
        ledger.clone(),
        seat_events.clone(),
        config.features.strict_hold_capture,
    );

    // Create the shared application state
    let state = Arc::new(AppState {
        config: config.clone(),
        db: db.clone(),
        ledger,
        cache,
        holds: hold_service,
        bookings: booking_service,
        seat_events,
    });

    // --- Start background tasks ---

    // Janitor для истёкших удержаний
    task::spawn(holds::sweep_loop(state.clone()));

    // --- Start the web server ---

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create the main router
    let app = Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        // Pass the application state to the router
        .with_state(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Дожидаемся возврата соединений в пул перед выходом
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
