//! Domain models and value objects

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque identifier of an item in the upstream listing
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StoryId(pub u64);

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item detail as returned by the item source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub id: StoryId,
    /// Free-form item type ("story", "comment", "job", ...)
    #[serde(rename = "type", default)]
    pub item_type: String,
    /// Link target, empty for text posts
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Author handle
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    /// Unix timestamp of submission
    #[serde(default)]
    pub time: Option<i64>,
    /// Total comment count
    #[serde(default)]
    pub descendants: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// An item enriched with its listing position and display host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStory {
    #[serde(flatten)]
    pub item: RawItem,
    pub host: String,
    /// Zero-based position in the listing, fixed at dispatch
    pub rank: usize,
}

impl RankedStory {
    pub fn new(item: RawItem, rank: usize) -> Self {
        let host = host_of(&item.url);
        Self { item, host, rank }
    }

    /// True for link stories: type "story" with a non-empty URL
    pub fn is_story_link(&self) -> bool {
        self.item.item_type == "story" && !self.item.url.is_empty()
    }
}

/// Derive a display host from a URL, dropping a leading "www."
///
/// Returns an empty string for empty, relative or unparsable URLs.
pub fn host_of(raw_url: &str) -> String {
    if raw_url.is_empty() {
        return String::new();
    }

    match url::Url::parse(raw_url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Rank-ordered stories produced by one pipeline run
///
/// Built once and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<RankedStory>);

impl ResultSet {
    /// Build a result set, ordering stories by rank
    pub fn from_ranked(mut stories: Vec<RankedStory>) -> Self {
        stories.sort_by_key(|s| s.rank);
        Self(stories)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedStory> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[RankedStory] {
        &self.0
    }

    /// Ranks in result order
    pub fn ranks(&self) -> Vec<usize> {
        self.0.iter().map(|s| s.rank).collect()
    }

    pub fn into_inner(self) -> Vec<RankedStory> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a RankedStory;
    type IntoIter = std::slice::Iter<'a, RankedStory>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A unit of work for the fetch pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchJob {
    pub id: StoryId,
    pub rank: usize,
}

/// Counters for a single fetch pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Jobs whose outcome reached the aggregator
    pub completed: usize,
    /// Items that passed the story-link filter
    pub qualified: usize,
    /// Items fetched but rejected by the filter
    pub filtered: usize,
    /// Items that failed or timed out upstream
    pub dropped: usize,
}

/// A serialized result set with its expiry metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Vec<u8>,
    pub stored_at: OffsetDateTime,
    /// End of the soft TTL
    pub fresh_until: OffsetDateTime,
    /// Hard bound after which the entry must not be served
    pub expires_at: OffsetDateTime,
}

/// How an entry relates to the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl CacheEntry {
    /// Time since the entry was stored
    pub fn age(&self, now: OffsetDateTime) -> time::Duration {
        now - self.stored_at
    }

    pub fn freshness(&self, now: OffsetDateTime) -> Freshness {
        if now < self.fresh_until {
            Freshness::Fresh
        } else if now < self.expires_at {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// Where a served list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Live cache entry
    Cache,
    /// Stale entry served while another caller refreshes
    Stale,
    /// Freshly fetched in this call
    Upstream,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Cache => "cache",
            Origin::Stale => "stale",
            Origin::Upstream => "upstream",
        };
        f.write_str(name)
    }
}

/// Response from the top stories service
#[derive(Debug, Clone, Serialize)]
pub struct TopStories {
    pub stories: ResultSet,
    pub origin: Origin,
    /// Fetch counters, present only when this call ran the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FetchStats>,
}
