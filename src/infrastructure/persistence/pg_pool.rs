use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{info, instrument, warn};

use crate::application::ports::RepositoryError;

const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Connects to the job store, retrying with exponential backoff while the
/// database is still starting up.
#[instrument(skip(url))]
pub async fn create_pool(
    url: &str,
    max_connections: u32,
    connect_attempts: u32,
) -> Result<PgPool, RepositoryError> {
    let mut attempt = 1;
    let mut delay = Duration::from_millis(500);

    loop {
        let connected = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await;

        match connected {
            Ok(pool) => {
                info!(attempt, "Job store connection pool established");
                return Ok(pool);
            }
            Err(e) if attempt < connect_attempts => {
                warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Job store connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
            Err(e) => return Err(RepositoryError::ConnectionFailed(e.to_string())),
        }
    }
}
