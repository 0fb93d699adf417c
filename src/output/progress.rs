use chrono::{TimeZone, Utc};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::StatusCode;

use crate::github::FetchObserver;

use super::styling::{bright_green, bright_red, bright_yellow, dim};

/// Terminal progress display for one repository fetch.
///
/// Implements the observer seam of the fetch machinery with an indicatif
/// bar: a spinner until the page count is known, a bar afterwards, and
/// styled diagnostics printed above it for every retry and sleep so an
/// operator can see why the process is pausing.
pub struct FetchProgress {
    bar: ProgressBar,
}

impl FetchProgress {
    pub fn new(repository: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {msg} {spinner} [{elapsed_precise}]")
                .unwrap(),
        );
        bar.set_message(bright_yellow(format!("Downloading pages for {repository}")).to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self, repository: &str, pages: usize, records: usize) {
        self.bar.finish_with_message(
            bright_green(format!(
                "Downloaded {pages} pages ({records} records) for {repository} ✓"
            ))
            .to_string(),
        );
    }
}

impl FetchObserver for FetchProgress {
    fn transport_error(&self, url: &str, error: &reqwest::Error, retries_used: u32, budget: u32) {
        self.bar.println(
            bright_yellow(format!(
                "Request to {url} failed ({error}), {retries_used}/{budget} retries used"
            ))
            .to_string(),
        );
    }

    fn bad_status(&self, url: &str, status: StatusCode, retries_used: u32, budget: u32) {
        self.bar.println(
            bright_yellow(format!(
                "Request to {url} returned status {status}, {retries_used}/{budget} retries used"
            ))
            .to_string(),
        );
    }

    fn backing_off(&self, _url: &str, seconds: u64) {
        self.bar
            .println(dim(format!("Backing off for {seconds}s before retrying")).to_string());
    }

    fn rate_limit_wait(&self, seconds: f64, reset_epoch_seconds: i64) {
        let until = Utc
            .timestamp_opt(reset_epoch_seconds, 0)
            .single()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "the rate limit reset".to_string());
        self.bar.println(
            dim(format!(
                "Sleeping {seconds:.0}s until {until} while the API rate limit resets"
            ))
            .to_string(),
        );
    }

    fn page_fetched(&self, page: u32, last_page: u32) {
        if last_page > 0 {
            self.bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg} [{bar:30}] {pos}/{len} pages")
                    .unwrap(),
            );
            self.bar.set_length(u64::from(last_page));
            self.bar.set_position(u64::from(page));
        } else {
            self.bar.tick();
        }
    }

    fn structural_error(&self, url: &str) {
        self.bar.println(
            bright_red(format!(
                "No workflow data provided by the GitHub API at {url}; \
                 the repository may not exist or the quota may be exhausted"
            ))
            .to_string(),
        );
    }

    fn fetch_failed(&self, url: &str) {
        self.bar
            .abandon_with_message(bright_red(format!("Could not retrieve data from {url}")).to_string());
    }

    fn cancelled(&self, url: &str) {
        self.bar
            .abandon_with_message(bright_red(format!("Fetch of {url} cancelled")).to_string());
    }
}
