//! quiet-hn adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `hn`: Hacker News API item source
//! - `cache`: In-memory result cache

mod cache_memory;
mod hn_api;

/// Re-exports for item source adapters
pub mod hn {
    pub use crate::hn_api::{DEFAULT_BASE_URL, HnItemSource};
}

/// Re-exports for cache adapters
pub mod cache {
    pub use crate::cache_memory::{CachePolicy, InMemoryResultCache};
}
