use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use presentation_backend::api;
use presentation_backend::config::AppConfig;
use presentation_backend::database::Database;
use presentation_backend::services::AppServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    // Initialize database
    let database = Database::connect(&config.database_url).await?;

    // Initialize services (job worker starts here)
    let services = AppServices::init(config, database).await?;

    // Start cache cleanup task
    let cleanup_interval = services.config.cache_cleanup_interval;
    tokio::spawn(services.cleanup_task().start());

    let addr: SocketAddr =
        format!("{}:{}", services.config.host, services.config.port).parse()?;

    // Build our application with routes
    let app = api::router(api::AppState::new(services.clone())).layer(CorsLayer::permissive());

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!(
        "📊 Cache cleanup task started (interval: {} seconds)",
        cleanup_interval.as_secs()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
