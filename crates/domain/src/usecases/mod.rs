//! Application use cases / business logic

pub mod aggregate;
pub mod fetch_pool;
pub mod top_stories;

pub use aggregate::{JobOutcome, Outcome, RankAggregator};
pub use fetch_pool::{FetchPool, FetchPoolConfig};
pub use top_stories::{PipelineError, STORIES_CACHE_KEY, TopStoriesConfig, TopStoriesService};
