use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use super::CredentialHolder;

/// How often the gate looks at the holder while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("No access token became available within {0:?}")]
    TimedOut(Duration),

    #[error("Token refresh was stopped before any token became available")]
    Stopped,
}

/// Block until the holder contains a token and return it.
///
/// The holder is polled every `poll_interval`. With a `deadline`, the wait
/// gives up once it elapses; without one it waits until a token shows up or
/// the holder is stopped.
pub async fn wait_for_token(
    holder: &CredentialHolder,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Result<Arc<str>, GateError> {
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        if let Some(token) = holder.get() {
            info!(
                waited_ms = started.elapsed().as_millis() as u64,
                "Access token available, opening gate"
            );
            return Ok(token);
        }
        if !holder.should_refresh() {
            return Err(GateError::Stopped);
        }

        let mut pause = poll_interval;
        if let Some(limit) = deadline {
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(GateError::TimedOut(limit));
            }
            pause = pause.min(limit - elapsed);
        }

        polls += 1;
        debug!(polls, "Waiting for access token");
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = holder.stopped() => {}
        }
    }
}
