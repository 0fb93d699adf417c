use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use log::{debug, warn};
use serde::Deserialize;

use crate::auth::Token;
use crate::error::Result;

use super::clock::{CancelToken, Clock, Sleeper};
use super::observer::FetchObserver;
use super::types::RateLimitSnapshot;

/// Remaining-quota level below which the monitor sleeps until the reset.
pub const DEFAULT_REMAINING_THRESHOLD: u32 = 10;

/// Seconds slept past the advertised reset instant, to absorb clock skew
/// between this host and the provider.
pub const DEFAULT_RESET_PADDING_SECONDS: i64 = 2;

#[derive(Deserialize)]
struct RateLimitEnvelope {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: RateLimitSnapshot,
}

/// Watches the provider's request quota and pauses the fetch before the
/// quota runs out.
///
/// Consulted once before the first page and once after every subsequent page,
/// never concurrently with an in-flight request. The snapshot request itself
/// is best-effort and never retried; when it fails the paginator keeps going
/// and lets the retry machinery absorb any hard rate-limit response.
pub struct RateLimitMonitor {
    client: reqwest::Client,
    token: Option<Token>,
    rate_limit_url: String,
    remaining_threshold: u32,
    reset_padding_seconds: i64,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn FetchObserver>,
    cancel: CancelToken,
}

impl RateLimitMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        token: Option<Token>,
        base_url: &str,
        remaining_threshold: u32,
        reset_padding_seconds: i64,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        observer: Arc<dyn FetchObserver>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            client,
            token,
            rate_limit_url: format!("{}/rate_limit", base_url.trim_end_matches('/')),
            remaining_threshold,
            reset_padding_seconds,
            clock,
            sleeper,
            observer,
            cancel,
        }
    }

    /// Fetch a fresh quota snapshot from the provider.
    pub async fn fetch_snapshot(&self) -> Result<RateLimitSnapshot> {
        let mut request = self.client.get(&self.rate_limit_url);
        if let Some(token) = &self.token {
            request = request.basic_auth("user", Some(token.as_str()));
        }
        let envelope: RateLimitEnvelope = request.send().await?.json().await?;
        debug!(
            "rate limit: {} of {} remaining, resets at {}",
            envelope.resources.core.remaining,
            envelope.resources.core.limit,
            envelope.resources.core.reset
        );
        Ok(envelope.resources.core)
    }

    /// Sleep until the quota window resets when the remaining quota is below
    /// the threshold.
    ///
    /// Returns the computed wait `(reset - now) + padding` in seconds, which
    /// may be negative under clock skew; the actual sleep is clamped to zero
    /// but the computed value is still reported for diagnostics. Returns 0.0
    /// without sleeping when the quota is comfortable.
    pub async fn wait_if_needed(&self, snapshot: &RateLimitSnapshot) -> f64 {
        if snapshot.remaining >= self.remaining_threshold {
            return 0.0;
        }
        let now = self.clock.now_epoch_seconds();
        let computed = (snapshot.reset - now + self.reset_padding_seconds) as f64;
        self.observer.rate_limit_wait(computed, snapshot.reset);
        if let Some(reset) = Utc.timestamp_opt(snapshot.reset, 0).single() {
            warn!(
                "only {} requests remaining, sleeping {computed:.0}s until quota resets at {reset}",
                snapshot.remaining
            );
        }
        if computed > 0.0 {
            let mut cancel = self.cancel.clone();
            tokio::select! {
                () = self.sleeper.sleep(Duration::from_secs_f64(computed)) => {}
                () = cancel.cancelled() => {}
            }
        }
        computed
    }

    /// Snapshot the quota and wait when needed, swallowing snapshot errors.
    ///
    /// Returns the seconds actually slept so the paginator can fold the wait
    /// into the fetch telemetry.
    pub async fn check_and_wait(&self) -> f64 {
        match self.fetch_snapshot().await {
            Ok(snapshot) => self.wait_if_needed(&snapshot).await.max(0.0),
            Err(error) => {
                warn!("could not read rate limit details, continuing without pacing: {error}");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use futures::FutureExt;

    use super::*;
    use crate::github::observer::NoopObserver;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_epoch_seconds(&self) -> i64 {
            self.0
        }
    }

    /// Records requested sleep durations instead of waiting.
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl RecordingSleeper {
        fn new() -> Self {
            Self(Mutex::new(Vec::new()))
        }

        fn slept(&self) -> Vec<Duration> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
            self.0.lock().unwrap().push(duration);
            async {}.boxed()
        }
    }

    fn monitor(clock_now: i64, sleeper: Arc<RecordingSleeper>) -> RateLimitMonitor {
        RateLimitMonitor::new(
            reqwest::Client::new(),
            None,
            "https://api.github.com",
            DEFAULT_REMAINING_THRESHOLD,
            DEFAULT_RESET_PADDING_SECONDS,
            Arc::new(FixedClock(clock_now)),
            sleeper,
            Arc::new(NoopObserver),
            CancelToken::never(),
        )
    }

    fn snapshot(remaining: u32, reset: i64) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: 5000,
            remaining,
            reset,
            used: 5000 - remaining,
        }
    }

    #[tokio::test]
    async fn test_wait_if_needed_sleeps_until_reset() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let monitor = monitor(1_000, Arc::clone(&sleeper));

        let waited = monitor.wait_if_needed(&snapshot(5, 1_060)).await;

        // (1060 - 1000) + 2 seconds of padding
        assert_eq!(waited, 62.0);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs_f64(62.0)]);
    }

    #[tokio::test]
    async fn test_wait_if_needed_skips_when_quota_is_comfortable() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let monitor = monitor(1_000, Arc::clone(&sleeper));

        let waited = monitor.wait_if_needed(&snapshot(50, 1_060)).await;

        assert_eq!(waited, 0.0);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_wait_if_needed_clamps_negative_wait_to_zero_sleep() {
        let sleeper = Arc::new(RecordingSleeper::new());
        // reset already passed relative to the local clock
        let monitor = monitor(2_000, Arc::clone(&sleeper));

        let waited = monitor.wait_if_needed(&snapshot(5, 1_900)).await;

        // the computed value is still reported for diagnostics
        assert_eq!(waited, -98.0);
        assert!(sleeper.slept().is_empty());
    }
}
