//! CAIRN Storage - Backing Store Trait and Lookup Cache
//!
//! Defines the backing store abstraction, an in-memory implementation, and
//! the cascading lookup cache that keeps store traffic to a minimum.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    BoundedRecencyCache, Existence, ExistenceSets, Lookup, LookupCoordinator,
    LookupStatsSnapshot, MembershipFilter, PreloadReport, Tier,
};
pub use memory::InMemoryBackingStore;
pub use store::{BackingStore, FetchResult};
