//! Deadline race for network-bound futures.
//!
//! `race` resolves to the future's own output or to [`Timeout`], whichever
//! happens first. The timer is owned by the race and is released as soon as
//! it settles. On timeout the pending future is dropped, so an HTTP request
//! behind it is aborted rather than left running in the background.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline elapsed before the raced future settled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation did not settle within {0:?}")]
pub struct Timeout(pub Duration);

/// Races `future` against `deadline`.
pub async fn race<F>(future: F, deadline: Duration) -> Result<F::Output, Timeout>
where
    F: Future,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| Timeout(deadline))
}

/// Converts a millisecond setting from config into a deadline.
pub fn deadline_from_ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
