use dotenv::dotenv;
use garagedesk_core::cache::{MemoryCache, NoopCache, ResponseCache};
use garagedesk_core::invoice::DatePrefixedGenerator;
use garagedesk_core::{db, handlers, AppState};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting GarageDesk Core Server...");

    // Initialize database connection pool and apply migrations
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
    let db_pool = db::create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // The response cache is an injected collaborator; running without one is
    // a supported configuration and degrades latency only.
    let cache: Arc<dyn ResponseCache> = if std::env::var("CACHE_ENABLED")
        .map(|v| v == "false" || v == "0")
        .unwrap_or(false)
    {
        info!("Response cache disabled");
        Arc::new(NoopCache)
    } else {
        Arc::new(MemoryCache::new())
    };

    let app_state = AppState::new(db_pool, cache, Arc::new(DatePrefixedGenerator));

    let app = handlers::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Get server configuration
    let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("SERVER_PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .map_err(|_| anyhow::anyhow!("Invalid SERVER_PORT"))?;

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}:{}: {}", host, port, e))?;

    info!("Server listening on {}:{}", host, port);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
