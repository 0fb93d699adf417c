use serde_json::Value;

/// One page's worth of raw workflow-run records, in the order the API
/// returned them. Immutable once produced by the paginator.
pub type PageBatch = Vec<Value>;

/// Outcome of one logical GET through the cautious requester.
///
/// `retries` is the number of re-attempts actually performed (zero when the
/// first attempt settled things) and `slept_seconds` the backoff time spent
/// between them. `response` is present only on success.
#[derive(Debug)]
pub struct RetryOutcome {
    pub succeeded: bool,
    pub retries: u32,
    pub slept_seconds: f64,
    pub response: Option<reqwest::Response>,
}

impl RetryOutcome {
    pub fn success(retries: u32, slept_seconds: f64, response: reqwest::Response) -> Self {
        Self {
            succeeded: true,
            retries,
            slept_seconds,
            response: Some(response),
        }
    }

    pub fn failure(retries: u32, slept_seconds: f64) -> Self {
        Self {
            succeeded: false,
            retries,
            slept_seconds,
            response: None,
        }
    }
}

/// The complete, validated outcome of one multi-page fetch.
///
/// Invariant: `valid == false` implies `pages` is empty. A failed fetch is
/// void, never partially usable, so callers must branch on `valid` before
/// touching `pages`. The constructors are the only way to build a result and
/// uphold the invariant.
#[derive(Debug)]
pub struct FetchResult {
    pub valid: bool,
    pub total_retry_count: u32,
    pub total_retry_time: f64,
    pub pages: Vec<PageBatch>,
}

impl FetchResult {
    pub fn success(total_retry_count: u32, total_retry_time: f64, pages: Vec<PageBatch>) -> Self {
        Self {
            valid: true,
            total_retry_count,
            total_retry_time,
            pages,
        }
    }

    pub fn failure(total_retry_count: u32, total_retry_time: f64) -> Self {
        Self {
            valid: false,
            total_retry_count,
            total_retry_time,
            pages: Vec::new(),
        }
    }

    /// Total number of workflow-run records across all pages.
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }
}

/// Rate-limit state reported by the provider for the core resource.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the quota window resets.
    pub reset: i64,
    #[serde(default)]
    pub used: u32,
}

/// Current position within a paginated collection, derived from the `Link`
/// header of the first response. `last_page == 0` means the collection fits
/// in a single page (or the provider did not say).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub next_page: u32,
    pub last_page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_result_has_no_pages() {
        let result = FetchResult::failure(3, 7.0);
        assert!(!result.valid);
        assert!(result.pages.is_empty());
        assert_eq!(result.total_retry_count, 3);
        assert_eq!(result.total_retry_time, 7.0);
    }

    #[test]
    fn test_record_count_sums_pages() {
        let pages = vec![
            vec![serde_json::json!({"id": 1}), serde_json::json!({"id": 2})],
            vec![],
            vec![serde_json::json!({"id": 3})],
        ];
        let result = FetchResult::success(0, 0.0, pages);
        assert_eq!(result.record_count(), 3);
    }
}
