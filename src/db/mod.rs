pub mod store;
pub mod upsert;

pub use store::{DocumentStore, Filter, SqliteStore, collections};
pub use upsert::upsert;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;
use crate::stripe::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub stripe: Arc<StripeClient>,
    pub site_url: String,
    pub session_endpoint: String,
}

/// Create collection tables and the uniqueness indexes that back the
/// idempotent mirror discipline.
pub fn init_db(conn: &Connection) -> Result<()> {
    for collection in collections::ALL {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, data TEXT NOT NULL)",
                collection
            ),
            [],
        )?;
    }

    // The external price id carries the uniqueness constraint the generic
    // upsert cannot guarantee on its own.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_prices_stripe_id
         ON prices (json_extract(data, '$.stripeID'))",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_uid
         ON users (json_extract(data, '$.uid'))",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_token
         ON sessions (json_extract(data, '$.sessionToken'))",
        [],
    )?;

    Ok(())
}

/// Single-connection in-memory pool for tests.
pub fn new_memory_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("in-memory pool")
}
