use crate::models::{ListingRecord, RawFieldMap};
use crate::normalize;
use crate::scrapers::embedded::extract_from_embedded_state;
use crate::scrapers::fetcher::PageFetcher;
use crate::scrapers::types::FetchOutcome;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pages fetched at once unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Why a harvest stopped dispatching pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every page up to the limit or the end of results was handled
    Completed,
    /// The portal served its block page for `url`
    Blocked { url: String },
}

/// Outcome of one harvest run
#[derive(Debug, Clone)]
pub struct Harvest<T> {
    pub records: Vec<T>,
    /// Pages that returned a usable body
    pub pages: usize,
    /// Pages that failed on transport and were skipped
    pub failed_pages: usize,
    /// Last page worth fetching, once the portal reported no results
    pub stop_page: Option<u64>,
    pub stop: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl<T> Harvest<T> {
    pub fn is_blocked(&self) -> bool {
        matches!(self.stop, StopReason::Blocked { .. })
    }
}

/// Results-page URLs in ascending page order, `1..=max_pages`.
pub fn page_urls(root_url: &str, max_pages: u64) -> Vec<(u64, String)> {
    (1..=max_pages)
        .map(|page| (page, format!("{root_url}{page}")))
        .collect()
}

/// Paginated harvester for the aqar results listing
pub struct AqarScraper {
    fetcher: Arc<PageFetcher>,
    concurrency: usize,
}

impl AqarScraper {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch pages `1..=max_pages` under the root URL and extract their raw listings.
    ///
    /// Pages are fetched concurrently but extracted in ascending page order. Dispatch stops
    /// at the first page the stop page covers or as soon as any page comes back blocked.
    pub async fn harvest(&self, root_url: &str, max_pages: u64) -> Harvest<RawFieldMap> {
        let started_at = Utc::now();
        let policy = self.fetcher.policy();
        info!(
            root_url,
            max_pages,
            concurrency = self.concurrency,
            initial_timeout_secs = policy.initial_timeout.as_secs(),
            timeout_step_secs = policy.timeout_step.as_secs(),
            max_attempts = ?policy.max_attempts,
            "Starting harvest"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let blocked = Arc::new(AtomicBool::new(false));
        let blocked_url: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let mut tasks = JoinSet::new();

        for (page, url) in page_urls(root_url, max_pages) {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if blocked.load(Ordering::Acquire) {
                debug!(page, "Block detected, not dispatching further pages");
                break;
            }
            if self.fetcher.stop_page().covers(page) {
                debug!(page, "Past the last results page, not dispatching further pages");
                break;
            }

            let fetcher = self.fetcher.clone();
            let blocked = blocked.clone();
            let blocked_url = blocked_url.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = fetcher.fetch(&url).await;
                if matches!(outcome, Ok(FetchOutcome::Blocked)) {
                    blocked.store(true, Ordering::Release);
                    if let Ok(mut first) = blocked_url.lock() {
                        first.get_or_insert_with(|| url.clone());
                    }
                }
                (page, url, outcome)
            });
        }

        let mut bodies = Vec::new();
        let mut failed_pages = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((page, _, Ok(FetchOutcome::Page(body)))) => bodies.push((page, body)),
                Ok((_, _, Ok(FetchOutcome::EndOfResults | FetchOutcome::Blocked))) => {}
                Ok((_, url, Err(e))) => {
                    warn!(url = %url, error = %e, "Skipping page");
                    failed_pages += 1;
                }
                Err(e) => {
                    error!(error = %e, "Fetch task failed");
                    failed_pages += 1;
                }
            }
        }

        bodies.sort_by_key(|(page, _)| *page);
        let mut records = Vec::new();
        for (page, body) in &bodies {
            let listings = extract_from_embedded_state(body);
            debug!(page, listings = listings.len(), "Extracted page");
            records.extend(listings);
        }

        let stop = match blocked_url.lock().ok().and_then(|first| first.clone()) {
            Some(url) => StopReason::Blocked { url },
            None => StopReason::Completed,
        };
        let harvest = Harvest {
            records,
            pages: bodies.len(),
            failed_pages,
            stop_page: self.fetcher.stop_page().get(),
            stop,
            started_at,
            finished_at: Utc::now(),
        };

        if let StopReason::Blocked { url } = &harvest.stop {
            error!(url = %url, pages = harvest.pages, "Harvest aborted by block page");
        } else {
            info!(
                pages = harvest.pages,
                failed_pages = harvest.failed_pages,
                records = harvest.records.len(),
                stop_page = ?harvest.stop_page,
                "Harvest complete"
            );
        }
        harvest
    }

    /// Harvest, clean and deduplicate.
    pub async fn run(&self, root_url: &str, max_pages: u64) -> Harvest<ListingRecord> {
        let harvest = self.harvest(root_url, max_pages).await;
        let records = normalize::dedupe(normalize::normalize(&harvest.records));
        Harvest {
            records,
            pages: harvest.pages,
            failed_pages: harvest.failed_pages,
            stop_page: harvest.stop_page,
            stop: harvest.stop,
            started_at: harvest.started_at,
            finished_at: harvest.finished_at,
        }
    }
}
