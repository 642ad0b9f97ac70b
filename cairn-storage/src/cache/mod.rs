//! Cascading lookup cache in front of a slow backing store.
//!
//! Four in-memory structures, consulted cheapest first, decide whether a
//! lookup needs the store at all:
//!
//! - [`BoundedRecencyCache`]: hot, fully materialized records (LRU)
//! - [`ExistenceSets`]: keys already confirmed present or absent
//! - [`MembershipFilter`]: Bloom filter, never a false negative
//! - the store itself, only when the above cannot answer
//!
//! [`LookupCoordinator`] owns all of them and keeps them consistent.
//!
//! # Example
//!
//! ```ignore
//! let cache = LookupCoordinator::new(store, CascadeConfig::from_env())?;
//! cache.preload(known_keys);
//!
//! let lookup = cache.get(&key).await?;
//! if lookup.tier().touches_store() {
//!     tracing::debug!("paid for a store round trip");
//! }
//! ```

pub mod coordinator;
pub mod existence;
pub mod filter;
mod inflight;
pub mod lookup;
pub mod recency;
pub mod stats;

pub use coordinator::{LookupCoordinator, PreloadReport};
pub use existence::{Existence, ExistenceSets};
pub use filter::MembershipFilter;
pub use lookup::{Lookup, Tier};
pub use recency::BoundedRecencyCache;
pub use stats::LookupStatsSnapshot;
