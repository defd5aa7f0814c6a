use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseResult;

/// Create the connection pool, verify connectivity, and bring the
/// schema up to date with the embedded migrations.
pub async fn connect(connection_string: &str) -> DatabaseResult<PgPool> {
    info!("creating database connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(connection_string)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");
    Ok(pool)
}
