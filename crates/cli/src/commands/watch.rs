//! Watch command - periodic refresh loop

use anyhow::{Result, bail};
use quiet_hn_domain::Origin;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::args::WatchArgs;
use crate::commands::{Service, build_service, top::print_stories};
use crate::config::AppConfig;

pub async fn execute(args: WatchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let refresh_interval = args
        .interval
        .unwrap_or(config.watch.refresh_interval_secs);
    if refresh_interval == 0 {
        bail!("--interval must be greater than 0");
    }

    let service = build_service(&config, args.num_stories)?;

    tracing::info!(
        once = args.once,
        refresh_interval_secs = refresh_interval,
        ttl_secs = config.cache.ttl_secs,
        num_wanted = service.fetch_config().num_wanted,
        "Starting quiet-hn watch"
    );

    if args.once {
        check(&service).await;
        return Ok(());
    }

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    watch_until(&service, Duration::from_secs(refresh_interval), shutdown).await;

    tracing::info!("quiet-hn watch stopped");
    Ok(())
}

/// Check on every tick until `shutdown` resolves, abandoning any refresh in flight
async fn watch_until(service: &Service, period: Duration, shutdown: impl Future<Output = ()>) {
    let mut ticker = interval(period);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        tokio::select! {
            _ = check(service) => {}
            _ = &mut shutdown => {
                tracing::warn!("Abandoning refresh in flight");
                break;
            }
        }
    }

    tracing::info!("Shutting down gracefully");
}

/// Ask the service for the list and print it when it was refreshed
async fn check(service: &Service) {
    let started = Instant::now();
    match service.top_stories().await {
        Ok(top) => match top.origin {
            Origin::Upstream => print_stories(&top, started.elapsed()),
            Origin::Cache | Origin::Stale => {
                tracing::debug!(
                    origin = %top.origin,
                    count = top.stories.len(),
                    "Top stories unchanged"
                );
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Refresh failed");
        }
    }
}
