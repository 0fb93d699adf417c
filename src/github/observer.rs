use reqwest::StatusCode;

/// Receives progress and diagnostic events from the fetch machinery.
///
/// The requester and paginator never construct their own terminal display;
/// the CLI injects an indicatif-backed implementation and tests inject
/// `NoopObserver`.
pub trait FetchObserver: Send + Sync {
    /// A request failed at the transport level (connect, timeout, protocol).
    fn transport_error(&self, url: &str, error: &reqwest::Error, retries_used: u32, budget: u32);

    /// A response arrived but carried a non-success status code.
    fn bad_status(&self, url: &str, status: StatusCode, retries_used: u32, budget: u32);

    /// About to sleep before the next retry attempt.
    fn backing_off(&self, url: &str, seconds: u64);

    /// About to sleep (or not, when negative) until the rate limit resets.
    fn rate_limit_wait(&self, seconds: f64, reset_epoch_seconds: i64);

    /// A page of results was fetched. `last_page` is zero when unknown.
    fn page_fetched(&self, page: u32, last_page: u32);

    /// A success-status response arrived without the expected collection key.
    fn structural_error(&self, url: &str);

    /// The whole fetch failed; no partial data will be produced.
    fn fetch_failed(&self, url: &str);

    /// The fetch was cancelled by the caller.
    fn cancelled(&self, url: &str);
}

/// Observer that discards every event.
pub struct NoopObserver;

impl FetchObserver for NoopObserver {
    fn transport_error(&self, _url: &str, _error: &reqwest::Error, _retries: u32, _budget: u32) {}
    fn bad_status(&self, _url: &str, _status: StatusCode, _retries: u32, _budget: u32) {}
    fn backing_off(&self, _url: &str, _seconds: u64) {}
    fn rate_limit_wait(&self, _seconds: f64, _reset_epoch_seconds: i64) {}
    fn page_fetched(&self, _page: u32, _last_page: u32) {}
    fn structural_error(&self, _url: &str) {}
    fn fetch_failed(&self, _url: &str) {}
    fn cancelled(&self, _url: &str) {}
}
