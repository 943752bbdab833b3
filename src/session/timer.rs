//! One-shot inactivity guard for a session's read/write operations.
//!
//! Grounded on `original_source/include/beast_router/common/timer.hpp`,
//! which races a `boost::asio::steady_timer` against the pending I/O and
//! cancels it on completion. `tokio::time::timeout` is the idiomatic Rust
//! equivalent of that race — the non-elapsed branch drops the timer
//! future for free, which is exactly spec.md's invariant 13 ("a read
//! completing before the deadline cancels the timer").

use std::future::Future;
use std::time::Duration;

use crate::error::RouteError;

/// Races `fut` against an optional deadline. `None` means no deadline is
/// armed, matching `recv()`/`send()` without a duration.
pub(crate) async fn guard<F, T>(deadline: Option<Duration>, fut: F) -> Result<T, RouteError>
where
    F: Future<Output = Result<T, RouteError>>,
{
    match deadline {
        Some(d) => tokio::time::timeout(d, fut).await.unwrap_or(Err(RouteError::TimedOut)),
        None => fut.await,
    }
}
