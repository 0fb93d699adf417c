use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;

use crate::auth::Token;

use super::backoff::backoff_capped;
use super::clock::{CancelToken, Sleeper};
use super::observer::FetchObserver;
use super::types::RetryOutcome;

/// Username placeholder paired with the personal access token for basic auth.
const BASIC_AUTH_USER: &str = "user";

/// Performs one logical GET with retry on transport errors and retry on
/// non-success status codes, converting every failure into data.
///
/// Two retry loops are layered: the inner loop absorbs transport-level
/// exceptions (connection reset, timeout, protocol error), the outer loop
/// re-attempts the whole request when a response arrives with the wrong
/// status code. Each loop backs off exponentially by its own attempt number
/// and is budgeted by the same `max_retries`. This is the only boundary where
/// errors are intentionally swallowed: `request_with_caution` never returns
/// `Err`, it reports `succeeded = false` plus faithful retry and sleep
/// telemetry instead.
pub struct CautiousRequester {
    client: reqwest::Client,
    token: Option<Token>,
    success_status: StatusCode,
    base_delay_seconds: u64,
    max_delay_seconds: u64,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn FetchObserver>,
    cancel: CancelToken,
}

impl CautiousRequester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        token: Option<Token>,
        base_delay_seconds: u64,
        max_delay_seconds: u64,
        sleeper: Arc<dyn Sleeper>,
        observer: Arc<dyn FetchObserver>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            client,
            token,
            success_status: StatusCode::OK,
            base_delay_seconds,
            max_delay_seconds,
            sleeper,
            observer,
            cancel,
        }
    }

    fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.basic_auth(BASIC_AUTH_USER, Some(token.as_str()))
        } else {
            request
        }
    }

    /// Sleep for the backoff delay, racing against cancellation.
    /// Returns true when the sleep was cut short by a cancel.
    async fn pause(&self, seconds: u64) -> bool {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            () = self.sleeper.sleep(Duration::from_secs(seconds)) => false,
            () = cancel.cancelled() => true,
        }
    }

    fn delay_for(&self, attempt: u32) -> u64 {
        // attempt is always >= 1 here, so the precondition cannot fire
        backoff_capped(self.base_delay_seconds, attempt, self.max_delay_seconds)
            .unwrap_or(self.base_delay_seconds)
    }

    /// Perform one logical GET against `url` with the given query parameters.
    ///
    /// `max_retries = 0` means exactly one attempt with no retry on failure;
    /// the outcome then reports zero retries and zero sleep time.
    pub async fn request_with_caution(
        &self,
        url: &str,
        params: &[(String, String)],
        max_retries: u32,
    ) -> RetryOutcome {
        let mut total_retries = 0u32;
        let mut total_slept = 0.0f64;
        let mut status_retries = 0u32;

        loop {
            // Inner loop: keep sending until a response arrives or the
            // transport budget is spent.
            let mut transport_retries = 0u32;
            let response = loop {
                if self.cancel.is_cancelled() {
                    self.observer.cancelled(url);
                    return RetryOutcome::failure(total_retries, total_slept);
                }
                let request = self.authenticate(self.client.get(url).query(params));
                match request.send().await {
                    Ok(response) => break Some(response),
                    Err(error) => {
                        self.observer
                            .transport_error(url, &error, transport_retries, max_retries);
                        if transport_retries >= max_retries {
                            break None;
                        }
                        transport_retries += 1;
                        let delay = self.delay_for(transport_retries);
                        self.observer.backing_off(url, delay);
                        if self.pause(delay).await {
                            self.observer.cancelled(url);
                            return RetryOutcome::failure(total_retries, total_slept);
                        }
                        total_slept += delay as f64;
                        total_retries += 1;
                    }
                }
            };

            let Some(response) = response else {
                return RetryOutcome::failure(total_retries, total_slept);
            };

            let status = response.status();
            if status == self.success_status {
                debug!("GET {url} succeeded after {total_retries} retries");
                return RetryOutcome::success(total_retries, total_slept, response);
            }

            self.observer
                .bad_status(url, status, status_retries, max_retries);
            if status_retries >= max_retries {
                return RetryOutcome::failure(total_retries, total_slept);
            }
            status_retries += 1;
            let delay = self.delay_for(status_retries);
            self.observer.backing_off(url, delay);
            if self.pause(delay).await {
                self.observer.cancelled(url);
                return RetryOutcome::failure(total_retries, total_slept);
            }
            total_slept += delay as f64;
            total_retries += 1;
        }
    }
}
