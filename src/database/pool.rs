use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::config;

/// Connect to the configured database, verifying the connection up front.
pub async fn connect() -> Result<PgPool, sqlx::Error> {
    let db = &config().database;
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.connection_timeout))
        .connect(&db.url)
        .await
}

/// Connect lazily: the pool is created immediately, connections on first use.
pub fn connect_lazy() -> Result<PgPool, sqlx::Error> {
    let db = &config().database;
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.connection_timeout))
        .connect_lazy(&db.url)
}

/// Connect to an explicit URL. Used by provisioning commands that run before
/// the application database exists.
pub async fn connect_to(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(2).connect(url).await
}
