//! Database module
//!
//! Pool construction and schema checks.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Tables every backend needs
pub const REQUIRED_TABLES: [&str; 3] = ["documents", "identities", "sessions"];

/// Connect options with `search_path` pinned to `schema`
pub fn connect_options(database_url: &str, schema: &str) -> Result<PgConnectOptions, sqlx::Error> {
    Ok(PgConnectOptions::from_str(database_url)?.options([("search_path", schema)]))
}

/// Open a pool whose connections resolve tables in `schema`
pub async fn connect(
    database_url: &str,
    schema: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options(database_url, schema)?)
        .await
}

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist in `schema`
pub async fn check_schema(pool: &PgPool, schema: &str) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!(schema = %schema, table = %table, "Required table does not exist; run `provision setup`");
            return Ok(false);
        }
    }

    Ok(true)
}
