//! Cache Module
//!
//! In-memory query cache with stale-while-revalidate refresh and
//! capture-order eviction.

mod clock;
mod entry;
mod observer;
mod query;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryInfo};
pub use observer::{CacheObserver, NoopObserver, TracingObserver};
pub use query::{QueryCache, QueryCacheBuilder};
pub use stats::{CacheStats, StatsCounters};
pub use store::CacheStore;
