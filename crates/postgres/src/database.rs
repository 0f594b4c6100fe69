use sqlx::PgPool;

/// Creates a connection pool to the PostgreSQL database at `database_url`.
pub async fn create_connection_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}
