use crate::error::{FetchError, TransportError};
use crate::scrapers::traits::PageTransport;
use crate::scrapers::types::{FetchOutcome, RetryPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Marker the portal renders when blocking a client
pub const BLOCK_PHRASE: &str = "you have been blocked";
/// Marker the portal renders past the last results page ("no results")
pub const NO_RESULTS_PHRASE: &str = "لا توجد نتائج";

/// Lowest page number known to have no results, shared by every fetch worker.
#[derive(Debug)]
pub struct StopPage(AtomicU64);

impl StopPage {
    pub fn new() -> Self {
        Self(AtomicU64::new(u64::MAX))
    }

    /// Lower the mark to `page` if it is below the current value.
    pub fn lower_to(&self, page: u64) {
        self.0.fetch_min(page, Ordering::AcqRel);
    }

    /// True when `page` is at or beyond the mark.
    pub fn covers(&self, page: u64) -> bool {
        page >= self.0.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            u64::MAX => None,
            page => Some(page),
        }
    }
}

impl Default for StopPage {
    fn default() -> Self {
        Self::new()
    }
}

/// Page number carried by the last path segment of a results URL. Anything
/// unparsable counts as page 0.
pub fn page_number(url: &str) -> u64 {
    url.rsplit('/')
        .next()
        .and_then(|segment| segment.trim().parse().ok())
        .unwrap_or(0)
}

/// Fetches results pages with timeout growth, block detection and an end-of-results cutoff.
pub struct PageFetcher {
    transport: Arc<dyn PageTransport>,
    policy: RetryPolicy,
    stop_page: StopPage,
    cache: Mutex<HashMap<String, String>>,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn PageTransport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn PageTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            stop_page: StopPage::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn stop_page(&self) -> &StopPage {
        &self.stop_page
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let page = page_number(url);
        if self.stop_page.covers(page) {
            return Ok(FetchOutcome::EndOfResults);
        }

        if let Some(body) = self.cached(url) {
            return Ok(FetchOutcome::Page(body));
        }

        let body = self.get_with_retry(url).await?;

        if body.to_lowercase().contains(BLOCK_PHRASE) {
            error!(url = %url, "Blocked by the website");
            return Ok(FetchOutcome::Blocked);
        }

        if body.contains(NO_RESULTS_PHRASE) {
            self.stop_page.lower_to(page);
            info!(url = %url, page, "No results, lowering stop page");
            return Ok(FetchOutcome::EndOfResults);
        }

        if !body.is_empty() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(url.to_string(), body.clone());
            }
        }

        info!(url = %url, bytes = body.len(), "Fetched page");
        Ok(FetchOutcome::Page(body))
    }

    fn cached(&self, url: &str) -> Option<String> {
        self.cache.lock().ok()?.get(url).cloned()
    }

    async fn get_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            let timeout = self.policy.timeout_for(attempt);
            match self.transport.get(url, timeout).await {
                Ok(body) => return Ok(body),
                Err(TransportError::Timeout) => {
                    let next = self.policy.timeout_for(attempt + 1);
                    if !self.policy.allows(attempt + 1) {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(
                        url = %url,
                        transport = self.transport.name(),
                        timeout_secs = timeout.as_secs(),
                        next_timeout_secs = next.as_secs(),
                        "Timeout fetching page, retrying"
                    );
                    attempt += 1;
                }
                Err(source) => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source,
                    })
                }
            }
        }
    }
}
