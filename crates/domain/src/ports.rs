//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{RawItem, StoryId};

/// Error type for item source operations
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected status {status} while fetching {context}")]
    Status { status: u16, context: String },
    #[error("Failed to decode {context}: {message}")]
    Decode { context: String, message: String },
    #[error("Item {0} not found")]
    NotFound(StoryId),
}

/// Port for reading the upstream listing and item details
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch the ordered IDs of the current top stories
    async fn list_top_ids(&self) -> Result<Vec<StoryId>, UpstreamError>;

    /// Fetch detail for a single item
    async fn get_item(&self, id: StoryId) -> Result<RawItem, UpstreamError>;
}

/// Error type for result cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry within its TTL
    Fresh(Vec<u8>),
    /// Entry past its TTL but before hard expiry
    Stale(Vec<u8>),
    Miss,
}

/// Port for the short-lived result cache
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError>;

    /// Store a value, replacing any previous entry under the key
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
