use std::sync::Arc;

use log::{debug, error};
use reqwest::header::{HeaderMap, LINK};
use serde_json::Value;
use url::Url;

use super::client::CautiousRequester;
use super::observer::FetchObserver;
use super::rate_limit::RateLimitMonitor;
use super::types::{FetchResult, PageBatch, PaginationCursor};

/// JSON key holding the per-page collection of workflow runs.
const WORKFLOW_RUNS_KEY: &str = "workflow_runs";

/// Pagination is 1-indexed and the first request omits the page parameter,
/// so the first explicitly requested page is 2.
const FIRST_FOLLOW_UP_PAGE: u32 = 2;

/// `next` and `last` relations from a response `Link` header.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LinkRelations {
    pub next: Option<String>,
    pub last: Option<String>,
}

/// Parse the `Link` header into its `next`/`last` relation URLs.
///
/// The header looks like
/// `<https://api.github.com/...&page=2>; rel="next", <...&page=9>; rel="last"`.
pub fn parse_link_header(headers: &HeaderMap) -> LinkRelations {
    let mut relations = LinkRelations::default();
    let Some(raw) = headers.get(LINK).and_then(|value| value.to_str().ok()) else {
        return relations;
    };
    for segment in raw.split(',') {
        let mut parts = segment.split(';');
        let Some(target) = parts.next() else { continue };
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');
        for param in parts {
            match param.trim() {
                "rel=\"next\"" => relations.next = Some(target.to_owned()),
                "rel=\"last\"" => relations.last = Some(target.to_owned()),
                _ => {}
            }
        }
    }
    relations
}

/// Extract the page number carried in a relation URL's `page` query
/// parameter. Zero when absent or unparsable.
fn page_number(relation_url: &str) -> u32 {
    Url::parse(relation_url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse().ok())
        })
        .unwrap_or(0)
}

/// Derive the pagination cursor from the first response's link relations.
pub fn cursor_from_links(relations: &LinkRelations) -> PaginationCursor {
    PaginationCursor {
        next_page: FIRST_FOLLOW_UP_PAGE,
        last_page: relations.last.as_deref().map(page_number).unwrap_or(0),
    }
}

/// Drives the cautious requester across every page of a paginated endpoint.
///
/// Pages are fetched strictly in order, one at a time, with the rate-limit
/// monitor consulted between requests; parallel fan-out would defeat the
/// quota-aware pacing. The assembled result preserves request order and keeps
/// empty pages. Any page failure voids the whole fetch: partially accumulated
/// pages are discarded and `valid` is false.
pub struct Paginator {
    requester: Arc<CautiousRequester>,
    monitor: Arc<RateLimitMonitor>,
    observer: Arc<dyn FetchObserver>,
}

impl Paginator {
    pub fn new(
        requester: Arc<CautiousRequester>,
        monitor: Arc<RateLimitMonitor>,
        observer: Arc<dyn FetchObserver>,
    ) -> Self {
        Self {
            requester,
            monitor,
            observer,
        }
    }

    /// Fetch every page of `url`, starting from the given base query
    /// parameters (page size, filters) without a page parameter.
    pub async fn fetch_pages(
        &self,
        url: &str,
        base_params: &[(String, String)],
        max_retries: u32,
    ) -> FetchResult {
        let mut total_retries = 0u32;
        let mut total_slept = 0.0f64;
        let mut pages: Vec<PageBatch> = Vec::new();

        let outcome = self
            .requester
            .request_with_caution(url, base_params, max_retries)
            .await;
        total_retries += outcome.retries;
        total_slept += outcome.slept_seconds;
        let Some(response) = outcome.response else {
            self.observer.fetch_failed(url);
            return FetchResult::failure(total_retries, total_slept);
        };

        let relations = parse_link_header(response.headers());
        let cursor = cursor_from_links(&relations);
        let mut has_next = relations.next.is_some();

        let Some(batch) = Self::decode_batch(response).await else {
            self.observer.structural_error(url);
            return FetchResult::failure(total_retries, total_slept);
        };
        pages.push(batch);
        self.observer.page_fetched(1, cursor.last_page);
        total_slept += self.monitor.check_and_wait().await;

        let mut page = cursor.next_page;
        while has_next {
            let mut params = base_params.to_vec();
            params.push(("page".to_owned(), page.to_string()));

            let outcome = self
                .requester
                .request_with_caution(url, &params, max_retries)
                .await;
            total_retries += outcome.retries;
            total_slept += outcome.slept_seconds;
            let Some(response) = outcome.response else {
                // the whole fetch is void, not partially usable
                self.observer.fetch_failed(url);
                return FetchResult::failure(total_retries, total_slept);
            };

            has_next = parse_link_header(response.headers()).next.is_some();

            let Some(batch) = Self::decode_batch(response).await else {
                self.observer.structural_error(url);
                return FetchResult::failure(total_retries, total_slept);
            };
            pages.push(batch);
            self.observer.page_fetched(page, cursor.last_page);
            total_slept += self.monitor.check_and_wait().await;
            page += 1;
        }

        debug!(
            "fetched {} pages from {url} with {total_retries} retries",
            pages.len()
        );
        FetchResult::success(total_retries, total_slept, pages)
    }

    /// Pull the `workflow_runs` array out of a success-status response.
    ///
    /// A success response without that key is a structural error: the
    /// provider answered with an error envelope (quota truly exhausted, repo
    /// missing) and retrying a well-formed-but-wrong response cannot help, so
    /// this is fatal rather than retriable. An empty array is a valid,
    /// empty page.
    async fn decode_batch(response: reqwest::Response) -> Option<PageBatch> {
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                error!("response body was not valid JSON: {err}");
                return None;
            }
        };
        match body.get(WORKFLOW_RUNS_KEY) {
            Some(Value::Array(runs)) => Some(runs.clone()),
            _ => {
                error!("response is missing the {WORKFLOW_RUNS_KEY} collection");
                None
            }
        }
    }
}
