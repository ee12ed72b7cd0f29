use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::debug;

use crate::utils::token_preview;

/// Shared bearer-token cell.
///
/// One refresh task writes, any number of workers read. Clone is cheap;
/// every clone observes the same token and the same stop flag.
#[derive(Debug, Clone, Default)]
pub struct CredentialHolder {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    token: RwLock<Option<Arc<str>>>,
    refreshing: AtomicBool,
    stop: Notify,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            token: RwLock::new(None),
            refreshing: AtomicBool::new(true),
            stop: Notify::new(),
        }
    }
}

impl CredentialHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored token. Readers that already hold the previous
    /// value keep using it.
    pub fn set(&self, token: impl Into<Arc<str>>) {
        let token = token.into();
        debug!(token = %token_preview(&token), "Publishing access token");
        *self.inner.token.write() = Some(token);
    }

    /// Current token, or `None` before the first successful authentication.
    pub fn get(&self) -> Option<Arc<str>> {
        self.inner.token.read().clone()
    }

    /// Ask the refresh loop to stop. Safe to call more than once.
    pub fn request_stop(&self) {
        if self.inner.refreshing.swap(false, Ordering::AcqRel) {
            debug!("Token refresh stop requested");
            self.inner.stop.notify_waiters();
        }
    }

    pub fn should_refresh(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    /// Resolves once `request_stop` has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.stop.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent stop is not missed
            notified.as_mut().enable();
            if !self.should_refresh() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_holder_starts_empty_and_refreshing() {
        let holder = CredentialHolder::new();
        assert!(holder.get().is_none());
        assert!(holder.should_refresh());
    }

    #[test]
    fn test_set_replaces_token_for_all_clones() {
        let holder = CredentialHolder::new();
        let reader = holder.clone();

        holder.set("first");
        assert_eq!(reader.get().as_deref(), Some("first"));

        holder.set("second".to_string());
        assert_eq!(reader.get().as_deref(), Some("second"));
    }

    #[test]
    fn test_previously_read_token_survives_replace() {
        let holder = CredentialHolder::new();
        holder.set("old");
        let captured = holder.get().unwrap();
        holder.set("new");
        assert_eq!(&*captured, "old");
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let holder = CredentialHolder::new();
        holder.request_stop();
        holder.request_stop();
        assert!(!holder.should_refresh());
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_request_stop() {
        let holder = CredentialHolder::new();
        let waiter = holder.clone();
        let handle = tokio::spawn(async move { waiter.stopped().await });

        tokio::task::yield_now().await;
        holder.request_stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("stopped() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_returns_immediately_when_already_stopped() {
        let holder = CredentialHolder::new();
        holder.request_stop();
        tokio::time::timeout(Duration::from_millis(100), holder.stopped())
            .await
            .expect("stopped() should not block once stopped");
    }
}
