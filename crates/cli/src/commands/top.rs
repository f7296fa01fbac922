//! Top command - fetch and print the current top stories once

use anyhow::{Context, Result};
use quiet_hn_domain::TopStories;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::args::TopArgs;
use crate::commands::build_service;
use crate::config::AppConfig;

#[derive(Serialize)]
struct TopOutput<'a> {
    elapsed_ms: u64,
    #[serde(flatten)]
    top: &'a TopStories,
}

pub async fn execute(args: TopArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let service = build_service(&config, args.num_stories)?;

    tracing::info!(
        num_workers = service.fetch_config().num_workers,
        num_wanted = service.fetch_config().num_wanted,
        "Fetching top stories"
    );

    let started = Instant::now();
    let top = service
        .top_stories()
        .await
        .context("Failed to load top stories")?;
    let elapsed = started.elapsed();

    if args.json {
        let output = TopOutput {
            elapsed_ms: elapsed.as_millis() as u64,
            top: &top,
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        print_stories(&top, elapsed);
    }

    Ok(())
}

pub(crate) fn print_stories(top: &TopStories, elapsed: Duration) {
    if top.stories.is_empty() {
        println!("No stories found.");
    } else {
        let width = top.stories.len().to_string().len();
        for (position, story) in top.stories.iter().enumerate() {
            if story.host.is_empty() {
                println!("{:>width$}. {}", position + 1, story.item.title);
            } else {
                println!(
                    "{:>width$}. {} ({})",
                    position + 1,
                    story.item.title,
                    story.host
                );
            }
            println!("{:>width$}  {}", "", story.item.url);
        }
    }

    println!();
    println!(
        "{} stories from {} in {:.2?}",
        top.stories.len(),
        top.origin,
        elapsed
    );
    if let Some(stats) = top.stats.filter(|s| s.dropped > 0) {
        println!("{} items could not be fetched", stats.dropped);
    }
}
