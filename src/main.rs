use forum_api::routes::create_routes;
use forum_api::{AppConfig, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting forum server...");

    // Load configuration from environment
    let config = AppConfig::from_env();
    info!("Server configuration loaded (site: {})", config.site.url);

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;
    info!("Application state initialized");

    // Build our application with routes
    let app = create_routes(&app_state)
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = config.server_address().parse()?;
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", config.server_address());

    // Start serving requests
    axum::serve(listener, app).await?;

    Ok(())
}
