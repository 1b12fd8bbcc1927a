use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::AppError;

pub type DbPool = SqlitePool;

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to the database, retrying with a fixed delay until it succeeds.
/// Startup blocks here rather than serving requests against a dead store.
pub async fn init_pool(database_url: &str) -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|err| AppError::Config(format!("invalid DATABASE_URL: {err}")))?
        .create_if_missing(true);

    loop {
        let attempt = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options.clone())
            .await;
        match attempt {
            Ok(pool) => return Ok(pool),
            Err(err) => {
                warn!("database connection failed, retrying in {CONNECT_RETRY_DELAY:?}: {err}");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}
