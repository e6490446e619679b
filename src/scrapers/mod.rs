pub mod aqar;
pub mod dom;
pub mod embedded;
pub mod fetcher;
pub mod http;
pub mod traits;
pub mod types;

pub use aqar::{AqarScraper, Harvest, StopReason};
pub use fetcher::PageFetcher;
pub use http::ReqwestTransport;
pub use traits::PageTransport;
pub use types::{CookieProfile, FetchOutcome, RetryPolicy};
