use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Shared connection pool. Each store ensures its own tables on
/// construction, so there is no separate migration step.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await?;
    Ok(pool)
}
