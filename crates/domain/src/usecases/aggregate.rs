//! Rank-preserving aggregation of fetch outcomes
//!
//! Workers complete in arbitrary order. The aggregator keeps a watermark at
//! the lowest rank still in flight and only accepts stories below it, so the
//! stories it has accepted are always the first qualifying ones by rank.

use crate::model::{FetchStats, RankedStory, ResultSet};

/// Result of fetching one job
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Fetched and passed the story-link filter
    Qualified(RankedStory),
    /// Fetched but not a story link
    Filtered,
    /// Upstream error or timeout
    Dropped,
}

/// An outcome tagged with the job's rank
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub rank: usize,
    pub outcome: Outcome,
}

#[derive(Debug)]
enum Slot {
    Pending,
    Done(Option<RankedStory>),
    Consumed,
}

/// Collects outcomes until `wanted` stories are settled or the listing is exhausted
#[derive(Debug)]
pub struct RankAggregator {
    wanted: usize,
    slots: Vec<Slot>,
    watermark: usize,
    accepted: Vec<RankedStory>,
    stats: FetchStats,
}

impl RankAggregator {
    pub fn new(listing_len: usize, wanted: usize) -> Self {
        Self {
            wanted,
            slots: (0..listing_len).map(|_| Slot::Pending).collect(),
            watermark: 0,
            accepted: Vec::with_capacity(wanted.min(listing_len)),
            stats: FetchStats::default(),
        }
    }

    /// Record an outcome. Returns true once no further outcome can change the result.
    pub fn record(&mut self, job: JobOutcome) -> bool {
        let Some(slot) = self.slots.get_mut(job.rank) else {
            tracing::warn!(rank = job.rank, "Ignoring outcome for out-of-range rank");
            return self.is_complete();
        };

        if !matches!(slot, Slot::Pending) {
            tracing::warn!(rank = job.rank, "Ignoring duplicate outcome");
            return self.is_complete();
        }

        self.stats.completed += 1;
        *slot = match job.outcome {
            Outcome::Qualified(story) => {
                self.stats.qualified += 1;
                Slot::Done(Some(story))
            }
            Outcome::Filtered => {
                self.stats.filtered += 1;
                Slot::Done(None)
            }
            Outcome::Dropped => {
                self.stats.dropped += 1;
                Slot::Done(None)
            }
        };

        self.advance();
        self.is_complete()
    }

    fn advance(&mut self) {
        while self.accepted.len() < self.wanted && self.watermark < self.slots.len() {
            let slot = &mut self.slots[self.watermark];
            if matches!(slot, Slot::Pending) {
                break;
            }
            if let Slot::Done(Some(story)) = std::mem::replace(slot, Slot::Consumed) {
                self.accepted.push(story);
            }
            self.watermark += 1;
        }
    }

    /// True when `wanted` stories are settled or every rank has reported
    pub fn is_complete(&self) -> bool {
        self.accepted.len() >= self.wanted || self.watermark >= self.slots.len()
    }

    /// Build the final result set.
    ///
    /// If the stream ended with ranks still pending, qualifying stories that
    /// arrived above the gap are used to fill the remaining places.
    pub fn finish(self) -> (ResultSet, FetchStats) {
        let mut stories = self.accepted;
        if stories.len() < self.wanted {
            stories.extend(self.slots.into_iter().filter_map(|slot| match slot {
                Slot::Done(story) => story,
                _ => None,
            }));
        }

        let mut set = ResultSet::from_ranked(stories).into_inner();
        set.truncate(self.wanted);
        (ResultSet::from_ranked(set), self.stats)
    }
}
