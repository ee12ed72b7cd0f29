//! Background token refresh.
//!
//! The loop authenticates, publishes the token into the `CredentialHolder`
//! and sleeps for a fixed interval. The stop flag is checked before every
//! tick; a stop request also cuts the sleep short.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::CredentialHolder;

/// Default pause between two authentications.
/// Catalog tokens stay valid well beyond a minute, so a token captured by a
/// worker right before a swap is still usable.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Anything that can obtain a fresh bearer token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<String>;
}

#[async_trait]
impl<A: Authenticator + ?Sized> Authenticator for Arc<A> {
    async fn authenticate(&self) -> Result<String> {
        (**self).authenticate().await
    }
}

/// Counters reported by the refresh loop once it has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Spawn the refresh loop on the current runtime.
///
/// The returned handle resolves after `holder.request_stop()` has been
/// called and the loop has noticed it.
pub fn spawn_refresh_loop<A>(
    authenticator: A,
    holder: CredentialHolder,
    interval: Duration,
) -> JoinHandle<RefreshSummary>
where
    A: Authenticator + 'static,
{
    tokio::spawn(async move { run_refresh_loop(&authenticator, &holder, interval).await })
}

pub async fn run_refresh_loop<A>(
    authenticator: &A,
    holder: &CredentialHolder,
    interval: Duration,
) -> RefreshSummary
where
    A: Authenticator + ?Sized,
{
    info!(interval_secs = interval.as_secs_f64(), "Token refresh loop started");
    let mut summary = RefreshSummary::default();

    while holder.should_refresh() {
        summary.ticks += 1;
        match authenticator.authenticate().await {
            Ok(token) => {
                // A stop may have landed while the request was in flight
                if !holder.should_refresh() {
                    debug!("Discarding token obtained after stop request");
                    break;
                }
                holder.set(token);
                summary.successes += 1;
                debug!(tick = summary.ticks, "Access token refreshed");
            }
            Err(e) => {
                summary.failures += 1;
                warn!(
                    tick = summary.ticks,
                    error = %e,
                    "Authentication failed, waiting for next tick"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = holder.stopped() => {}
        }
    }

    info!(
        ticks = summary.ticks,
        successes = summary.successes,
        failures = summary.failures,
        "Token refresh loop stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingAuth {
        calls: AtomicU64,
        fail_on: Option<u64>,
    }

    impl CountingAuth {
        fn new() -> Self {
            Self { calls: AtomicU64::new(0), fail_on: None }
        }

        fn failing_on(call: u64) -> Self {
            Self { calls: AtomicU64::new(0), fail_on: Some(call) }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for CountingAuth {
        async fn authenticate(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(n) {
                anyhow::bail!("token endpoint unavailable");
            }
            Ok(format!("token-{}", n))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_publishes_token_immediately() {
        let auth = Arc::new(CountingAuth::new());
        let holder = CredentialHolder::new();
        let handle = spawn_refresh_loop(auth.clone(), holder.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(holder.get().as_deref(), Some("token-1"));

        holder.request_stop();
        let summary = handle.await.unwrap();
        assert_eq!(summary.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_replaced_every_interval() {
        let auth = Arc::new(CountingAuth::new());
        let holder = CredentialHolder::new();
        let handle = spawn_refresh_loop(auth.clone(), holder.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(auth.calls(), 3);
        assert_eq!(holder.get().as_deref(), Some("token-3"));

        holder.request_stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_authentication_after_stop() {
        let auth = Arc::new(CountingAuth::new());
        let holder = CredentialHolder::new();
        let handle = spawn_refresh_loop(auth.clone(), holder.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        holder.request_stop();
        let summary = handle.await.unwrap();
        let calls_at_stop = auth.calls();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(auth.calls(), calls_at_stop);
        assert_eq!(summary.ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_start_never_authenticates() {
        let auth = CountingAuth::new();
        let holder = CredentialHolder::new();
        holder.request_stop();

        let summary = run_refresh_loop(&auth, &holder, Duration::from_secs(1)).await;
        assert_eq!(summary, RefreshSummary::default());
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_previous_token() {
        let auth = Arc::new(CountingAuth::failing_on(2));
        let holder = CredentialHolder::new();
        let handle = spawn_refresh_loop(auth.clone(), holder.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(auth.calls(), 2);
        assert_eq!(holder.get().as_deref(), Some("token-1"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(holder.get().as_deref(), Some("token-3"));

        holder.request_stop();
        let summary = handle.await.unwrap();
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.successes, 2);
    }
}
