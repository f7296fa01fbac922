//! CLI subcommands

pub mod config;
pub mod doctor;
pub mod top;
pub mod watch;

use anyhow::{Context, Result};
use quiet_hn_adapters::{cache::InMemoryResultCache, hn::HnItemSource};
use quiet_hn_domain::{ItemSource, SystemClock, usecases::TopStoriesService};
use std::sync::Arc;

use crate::config::AppConfig;

/// Service wired to the Hacker News API and an in-process cache
pub(crate) type Service = TopStoriesService<dyn ItemSource, InMemoryResultCache>;

pub(crate) fn build_item_source(config: &AppConfig) -> Result<Arc<dyn ItemSource>> {
    let source = HnItemSource::with_base_url(
        config.upstream.base_url.clone(),
        config.upstream_timeout(),
    )
    .context("Failed to build HTTP client")?;
    Ok(Arc::new(source))
}

pub(crate) fn build_service(config: &AppConfig, num_stories: Option<usize>) -> Result<Service> {
    let source = build_item_source(config)?;
    let cache = Arc::new(InMemoryResultCache::new(
        config.cache_policy(),
        Arc::new(SystemClock),
    ));

    Ok(TopStoriesService::new(
        source,
        cache,
        config.top_stories_config(num_stories),
    ))
}
