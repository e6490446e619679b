pub mod categories;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod scrapers;

pub use config::HarvestConfig;
pub use models::{ListingRecord, RawFieldMap, SaleType};
pub use scrapers::{AqarScraper, PageFetcher, ReqwestTransport};
