//! Resilient, rate-limit-aware fetching of GitHub Actions workflow-run
//! history: exponential backoff, cautious retrying, quota pacing, and
//! pagination tracking.

pub mod backoff;
pub mod client;
pub mod clock;
pub mod fetcher;
pub mod observer;
pub mod paginate;
pub mod rate_limit;
pub mod types;


pub use clock::cancel_pair;
pub use fetcher::GitHubFetcher;
pub use observer::FetchObserver;
pub use types::PageBatch;
