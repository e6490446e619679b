use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;

/// Single HTTP GET against the portal.
/// The fetcher owns retries and page semantics; implementations only move bytes.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// GET `url`, giving up after `timeout`
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, TransportError>;

    /// Name of the transport, for logs
    fn name(&self) -> &'static str;
}
