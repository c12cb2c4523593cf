use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

/// Run `op` up to `max_attempts` times with a fixed `delay` between attempts.
/// Returns the last error once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(name: &str, max_attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts => {
                warn!(op = name, attempt, max_attempts, error = %e, "attempt failed, retrying in {:?}", delay);
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(op = name, attempts = max_attempts, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}
