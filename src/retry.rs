//! Bounded fixed-interval retry for "wait until the page settles" steps.
//!
//! This is the only retry mechanism in the crawler. An operation is run up
//! to `retries` times with a fixed sleep between failed attempts; once the
//! budget is spent the last error is wrapped in
//! [`SearchError::RetriesExhausted`], keeping its kind.

use crate::error::SearchError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

#[instrument(level = "info", skip_all, fields(%keyword, retries))]
pub async fn wait_until_succeeds<T, F, Fut>(
    retries: u32,
    interval: Duration,
    keyword: &str,
    mut op: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let attempts = retries.max(1);
    let t0 = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                error!(
                    attempt,
                    max = attempts,
                    elapsed_ms_total = t0.elapsed().as_millis(),
                    error = %e,
                    "exhausted retries"
                );
                return Err(SearchError::RetriesExhausted {
                    keyword: keyword.to_string(),
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(attempt, max = attempts, ?interval, error = %e, "attempt failed; waiting");
                sleep(interval).await;
            }
        }
    }
}
