use std::sync::Arc;

use log::info;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::auth::{CredentialSource, Token};
use crate::error::{Result, WorkHistError};

use super::client::CautiousRequester;
use super::clock::{CancelToken, Clock, Sleeper, SystemClock, TokioSleeper};
use super::observer::{FetchObserver, NoopObserver};
use super::paginate::Paginator;
use super::rate_limit::{
    RateLimitMonitor, DEFAULT_RESET_PADDING_SECONDS, DEFAULT_REMAINING_THRESHOLD,
};
use super::types::FetchResult;

/// Identifies this client to the GitHub API.
const USER_AGENT_VALUE: &str = concat!("workhist/", env!("CARGO_PKG_VERSION"));

/// Provider maximum for the `per_page` query parameter.
pub const PER_PAGE_MAXIMUM: u32 = 100;

/// Default ceiling for a single backoff sleep.
pub const DEFAULT_MAX_DELAY_SECONDS: u64 = 900;

/// Tuning knobs for one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub per_page: u32,
    pub max_retries: u32,
    pub base_delay_seconds: u64,
    pub max_delay_seconds: u64,
    pub remaining_threshold: u32,
    pub reset_padding_seconds: i64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            per_page: PER_PAGE_MAXIMUM,
            max_retries: 5,
            base_delay_seconds: 1,
            max_delay_seconds: DEFAULT_MAX_DELAY_SECONDS,
            remaining_threshold: DEFAULT_REMAINING_THRESHOLD,
            reset_padding_seconds: DEFAULT_RESET_PADDING_SECONDS,
        }
    }
}

/// Top-level entry point for downloading a repository's workflow-run history.
///
/// Resolves the credential, builds the initial query parameters, and drives
/// the paginator. The outcome is always returned as data: callers must check
/// `FetchResult::valid` before touching `pages`.
pub struct GitHubFetcher {
    client: reqwest::Client,
    token: Option<Token>,
    base_url: String,
    owner: String,
    repo: String,
    options: FetchOptions,
    observer: Arc<dyn FetchObserver>,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl GitHubFetcher {
    /// Create a fetcher for the repository at `project_path` ("owner/repo").
    pub fn new(
        base_url: String,
        project_path: &str,
        credentials: &dyn CredentialSource,
        options: FetchOptions,
    ) -> Result<Self> {
        let mut parts = project_path.split('/');
        let (Some(owner), Some(repo), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(WorkHistError::Config(format!(
                "repository path must be in format 'owner/repo', got '{project_path}'"
            )));
        };
        if owner.is_empty() || repo.is_empty() {
            return Err(WorkHistError::Config(format!(
                "repository path must be in format 'owner/repo', got '{project_path}'"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| WorkHistError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: credentials.github_token(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            options,
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(SystemClock),
            cancel: CancelToken::never(),
        })
    }

    /// Inject the progress/diagnostic observer.
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Inject the sleeper used for backoff and rate-limit waits.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach a cancellation token checked before every request and sleep.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// API URL of the repository's workflow-run collection.
    pub fn runs_url(&self) -> String {
        crate::produce::create_github_api_url(&self.base_url, &self.owner, &self.repo)
    }

    /// Download every page of workflow-run history.
    ///
    /// Pages arrive strictly in request order. All retry, backoff, and
    /// rate-limit behavior is internal; the caller sees one tri-state outcome
    /// plus telemetry.
    pub async fn fetch_all(&self) -> FetchResult {
        let url = self.runs_url();
        info!("fetching workflow runs from {url}");

        let requester = Arc::new(CautiousRequester::new(
            self.client.clone(),
            self.token.clone(),
            self.options.base_delay_seconds,
            self.options.max_delay_seconds,
            Arc::clone(&self.sleeper),
            Arc::clone(&self.observer),
            self.cancel.clone(),
        ));
        let monitor = Arc::new(RateLimitMonitor::new(
            self.client.clone(),
            self.token.clone(),
            &self.base_url,
            self.options.remaining_threshold,
            self.options.reset_padding_seconds,
            Arc::clone(&self.clock),
            Arc::clone(&self.sleeper),
            Arc::clone(&self.observer),
            self.cancel.clone(),
        ));
        let paginator = Paginator::new(requester, monitor, Arc::clone(&self.observer));

        let base_params = vec![("per_page".to_owned(), self.options.per_page.to_string())];
        paginator
            .fetch_pages(&url, &base_params, self.options.max_retries)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;

    #[test]
    fn test_fetcher_parses_project_path() {
        let fetcher = GitHubFetcher::new(
            "https://api.github.com".to_string(),
            "octo-org/octo-repo",
            &StaticCredentials(None),
            FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(
            fetcher.runs_url(),
            "https://api.github.com/repos/octo-org/octo-repo/actions/runs"
        );
    }

    #[test]
    fn test_fetcher_rejects_invalid_project_path() {
        let result = GitHubFetcher::new(
            "https://api.github.com".to_string(),
            "missing-slash",
            &StaticCredentials(None),
            FetchOptions::default(),
        );
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("owner/repo"));
    }

    #[test]
    fn test_fetcher_rejects_extra_path_segments() {
        let result = GitHubFetcher::new(
            "https://api.github.com".to_string(),
            "owner/repo/extra",
            &StaticCredentials(None),
            FetchOptions::default(),
        );
        assert!(result.is_err());
    }
}
