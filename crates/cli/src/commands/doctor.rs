//! Doctor command - validate configuration and upstream reachability

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use crate::args::DoctorArgs;
use crate::commands::build_item_source;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    pipeline: CheckResult,
    upstream: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        pipeline: CheckResult::error("Not checked"),
        upstream: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.pipeline = check_pipeline(config);

        report.upstream = if args.offline {
            CheckResult::warn(format!(
                "Skipped (--offline), base_url: {}",
                config.upstream.base_url
            ))
        } else {
            check_upstream(config).await
        };
    }

    let checks = [&report.config, &report.pipeline, &report.upstream];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_pipeline(config: &AppConfig) -> CheckResult {
    let pipeline = &config.pipeline;
    let cache = &config.cache;

    let details = serde_json::json!({
        "num_workers": pipeline.num_workers,
        "num_wanted": pipeline.num_wanted,
        "job_timeout_secs": pipeline.job_timeout_secs,
        "ttl_secs": cache.ttl_secs,
        "hard_expiry_secs": cache.hard_expiry_secs,
    });

    if pipeline.num_wanted == 0 {
        return CheckResult::warn("num_wanted is 0; every run returns an empty list")
            .with_details(details);
    }

    if pipeline.num_workers > pipeline.num_wanted * 2 {
        return CheckResult::warn(format!(
            "{} workers for {} stories; most fetches will be discarded",
            pipeline.num_workers, pipeline.num_wanted
        ))
        .with_details(details);
    }

    CheckResult::ok(format!(
        "{} workers, {} stories, cache ttl {}s",
        pipeline.num_workers, pipeline.num_wanted, cache.ttl_secs
    ))
    .with_details(details)
}

async fn check_upstream(config: &AppConfig) -> CheckResult {
    let source = match build_item_source(config) {
        Ok(s) => s,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };

    let started = Instant::now();
    match source.list_top_ids().await {
        Ok(ids) if ids.is_empty() => {
            CheckResult::warn(format!("{} returned an empty listing", config.upstream.base_url))
        }
        Ok(ids) => CheckResult::ok(format!(
            "{} top ids from {}",
            ids.len(),
            config.upstream.base_url
        ))
        .with_details(serde_json::json!({
            "count": ids.len(),
            "latency_ms": started.elapsed().as_millis() as u64,
        })),
        Err(e) => CheckResult::error(format!(
            "Failed to fetch listing from {}: {}",
            config.upstream.base_url, e
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("quiet-hn Doctor Report");
    println!("======================");
    println!();

    print_check("Config", &report.config);
    print_check("Pipeline", &report.pipeline);
    print_check("Upstream", &report.upstream);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: quiet-hn top");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
