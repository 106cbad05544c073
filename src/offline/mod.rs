//! Client-side offline support: connectivity state, local persistence, and
//! the offline-first fallback helper.

mod connectivity;
mod fallback;
mod store;

pub use connectivity::{ConnectivitySnapshot, ConnectivityState};
pub use fallback::{FallbackOutcome, FallbackSource, OfflineFirst};
pub use store::{OfflineStore, PendingSyncItem, QueuedWrite};
