use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;

/// Wall-clock seam so rate-limit arithmetic can be tested with a fixed time.
pub trait Clock: Send + Sync {
    /// Current time as seconds since the Unix epoch.
    fn now_epoch_seconds(&self) -> i64;
}

/// The real wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Blocking-wait seam so retry and rate-limit sleeps can be tested without
/// actually waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

/// Cancellation signal for a long-running fetch.
///
/// A multi-page fetch against a slow or down API can block for a long time in
/// backoff and rate-limit sleeps. The token is checked before every request
/// and raced against every sleep so a caller can abort promptly.
#[derive(Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never be cancelled.
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the paired handle fires. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Handle used to cancel an in-flight fetch.
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// Create a linked cancellation handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelToken { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_pair_signals_token() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_never_token_is_not_cancelled() {
        assert!(!CancelToken::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, mut token) = cancel_pair();
        handle.cancel();
        token.cancelled().await;
    }
}
