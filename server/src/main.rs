use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use boxoffice_server::clock::SystemClock;
use boxoffice_server::config::Config;
use boxoffice_server::routes::create_routes;
use boxoffice_server::state::AppState;
use boxoffice_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("boxoffice_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    let store = PgStore::new(pool, config.lock_timeout);
    store.migrate().await.expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let state = AppState::new(Arc::new(store), Arc::new(SystemClock), &config);
    let app = create_routes(state, &config);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");
    tracing::info!("Server running at http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
