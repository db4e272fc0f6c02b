//! Sync layer: contract service client, live analysis progress feed, and the
//! query cache that the feed invalidates when a job finishes.

pub mod cache;
pub mod feed;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod monitor;

pub use cache::{CacheKey, QueryCache, reanalysis_keys, stale_keys};
#[cfg(feature = "http")]
pub use cache::CachedClient;
pub use feed::{StreamEnd, consume_progress, watch_until_terminal};
#[cfg(feature = "http")]
pub use http::{ApiClient, Reanalysis, SyncError};
#[cfg(feature = "http")]
pub use monitor::ProgressMonitor;
