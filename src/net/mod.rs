//! Network types and the outbound HTTP client.

mod client;
mod types;

pub use client::{Fetch, HttpFetcher};
pub use types::{FetchRequest, FetchResponse, ResourceKind};

#[cfg(test)]
pub(crate) use client::mock::MockFetch;
