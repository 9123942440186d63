use std::sync::Arc;

use account_portal::config::Config;
use account_portal::db::{AppState, SqliteStore, init_db};
use account_portal::handlers;
use account_portal::stripe::StripeClient;
use r2d2_sqlite::SqliteConnectionManager;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let manager = SqliteConnectionManager::file(&config.database_path);
    let pool = r2d2::Pool::new(manager)?;
    let conn = pool.get()?;
    init_db(&conn)?;
    drop(conn);

    let state = AppState {
        store: Arc::new(SqliteStore::new(pool)),
        stripe: Arc::new(StripeClient::new(&config)?),
        site_url: config.site_url.clone(),
        session_endpoint: config.session_endpoint.clone(),
    };

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.addr();
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
