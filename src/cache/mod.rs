//! Versioned response caches for offline support.
//!
//! Three namespaces (static assets, API responses, images) back the worker's
//! fetch strategies. Each namespace carries a generation tag in its physical
//! name; stale generations are purged wholesale at activation.

mod names;
mod store;

pub use names::{CacheClass, CacheNames};
pub use store::{CacheStore, CachedResponse, SqliteStore};

pub(crate) use store::parse_datetime;
