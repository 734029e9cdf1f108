use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;

use crate::error::ApiError;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConn<'a> = PooledConnection<'a, AsyncPgConnection>;

/// Builds the connection pool the whole service shares. Handlers receive
/// it through router state; nothing re-derives a connection per call.
pub async fn establish_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder().build(manager).await?;
    info!("Database connection pool established");
    Ok(pool)
}

/// Startup connectivity probe.
pub async fn ping(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get().await?;
    let test_query: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result(&mut conn)
        .await?;
    info!("Database test query result: {}", test_query);
    Ok(())
}

pub async fn get_conn(pool: &DbPool) -> Result<DbConn<'_>, ApiError> {
    pool.get()
        .await
        .map_err(|e| ApiError::Pool(e.to_string()))
}
