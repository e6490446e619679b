use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::scrapers::types::{CookieProfile, RetryPolicy};

pub const DEFAULT_ROOT_URL: &str = "https://sa.aqar.fm/%D8%B9%D9%82%D8%A7%D8%B1%D8%A7%D8%AA/";
const COOKIE_PLACEHOLDER: &str = "get-your-cookies";

/// Harvest configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub root_url: String,
    pub max_pages: u64,
    pub concurrency: usize,
    pub cookies: CookieProfile,
    pub retry: RetryPolicy,
    pub output_path: String,
}

impl HarvestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            initial_timeout: Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_SECS",
                defaults.initial_timeout.as_secs(),
            )?),
            timeout_step: Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_STEP_SECS",
                defaults.timeout_step.as_secs(),
            )?),
            max_attempts: match env::var("FETCH_MAX_ATTEMPTS") {
                Ok(raw) => Some(
                    raw.trim()
                        .parse()
                        .context("FETCH_MAX_ATTEMPTS must be a positive number")?,
                ),
                Err(_) => None,
            },
        };

        Ok(Self {
            root_url: env::var("ROOT_URL").unwrap_or_else(|_| DEFAULT_ROOT_URL.to_string()),
            max_pages: parse_var("MAX_PAGES", 9998)?,
            concurrency: parse_var("FETCH_CONCURRENCY", 10)?,
            cookies: CookieProfile {
                req_device_token: cookie_var("REQ_DEVICE_TOKEN"),
                cf_clearance: cookie_var("CF_CLEARANCE"),
                cf_bm: cookie_var("CF_BM"),
            },
            retry,
            output_path: env::var("OUTPUT_PATH").unwrap_or_else(|_| "listings.json".to_string()),
        })
    }
}

fn cookie_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| COOKIE_PLACEHOLDER.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}
