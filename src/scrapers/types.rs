use std::time::Duration;

/// Timeout growth policy for page requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Timeout of the first attempt
    pub initial_timeout: Duration,
    /// Added to the timeout after every timed out attempt
    pub timeout_step: Duration,
    /// Give up after this many timed out attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Timeout to use for the given 1-based attempt.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.initial_timeout + self.timeout_step * attempt.saturating_sub(1)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_secs(30),
            timeout_step: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// Anti-bot cookies the portal expects on every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieProfile {
    pub req_device_token: String,
    pub cf_clearance: String,
    pub cf_bm: String,
}

impl CookieProfile {
    /// Render as a single `Cookie` header value.
    pub fn header_value(&self) -> String {
        format!(
            "req-device-token={}; cf_clearance={}; __cf_bm={}",
            self.req_device_token, self.cf_clearance, self.cf_bm
        )
    }
}

/// Result of fetching one results page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw page body
    Page(String),
    /// The portal has no results at or beyond this page
    EndOfResults,
    /// The portal served its block page; the whole run must stop
    Blocked,
}
