//! Configuration loading and management

use anyhow::{Context, Result, bail};
use quiet_hn_adapters::{cache::CachePolicy, hn::DEFAULT_BASE_URL};
use quiet_hn_domain::usecases::{FetchPoolConfig, TopStoriesConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    #[serde(default = "default_num_wanted")]
    pub num_wanted: usize,

    #[serde(default = "default_timeout")]
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_hard_expiry")]
    pub hard_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_num_workers() -> usize {
    10
}

fn default_num_wanted() -> usize {
    30
}

fn default_ttl() -> u64 {
    5 * 60
}

fn default_hard_expiry() -> u64 {
    10 * 60
}

fn default_refresh_interval() -> u64 {
    60
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            num_wanted: default_num_wanted(),
            job_timeout_secs: default_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            hard_expiry_secs: default_hard_expiry(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("QUIET_HN")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.num_workers == 0 {
            bail!("pipeline.num_workers must be at least 1");
        }
        if self.pipeline.job_timeout_secs == 0 {
            bail!("pipeline.job_timeout_secs must be greater than 0");
        }
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be greater than 0");
        }
        if self.upstream.base_url.trim().is_empty() {
            bail!("upstream.base_url must not be empty");
        }
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than 0");
        }
        if self.cache.hard_expiry_secs < self.cache.ttl_secs {
            bail!(
                "cache.hard_expiry_secs ({}) must not be less than cache.ttl_secs ({})",
                self.cache.hard_expiry_secs,
                self.cache.ttl_secs
            );
        }
        if self.watch.refresh_interval_secs == 0 {
            bail!("watch.refresh_interval_secs must be greater than 0");
        }
        Ok(())
    }

    /// Build the top stories configuration, optionally overriding the story count
    pub fn top_stories_config(&self, num_stories: Option<usize>) -> TopStoriesConfig {
        TopStoriesConfig {
            fetch: FetchPoolConfig {
                num_workers: self.pipeline.num_workers,
                num_wanted: num_stories.unwrap_or(self.pipeline.num_wanted),
                job_timeout: Duration::from_secs(self.pipeline.job_timeout_secs),
            },
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            hard_expiry: Duration::from_secs(self.cache.hard_expiry_secs),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# quiet-hn configuration

[general]
log_level = "info"

[upstream]
base_url = "https://hacker-news.firebaseio.com/v0"
timeout_secs = 10

[pipeline]
# Concurrent item fetches
num_workers = 10
# Stories to return
num_wanted = 30
job_timeout_secs = 10

[cache]
# Served from cache without touching the API
ttl_secs = 300
# Never served after this, even while a refresh is running
hard_expiry_secs = 600

[watch]
refresh_interval_secs = 60
"#
        .to_string()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_matches_defaults() {
        let parsed: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(parsed.pipeline.num_workers, defaults.pipeline.num_workers);
        assert_eq!(parsed.pipeline.num_wanted, defaults.pipeline.num_wanted);
        assert_eq!(parsed.cache.ttl_secs, defaults.cache.ttl_secs);
        assert_eq!(parsed.cache.hard_expiry_secs, defaults.cache.hard_expiry_secs);
        assert_eq!(parsed.upstream.base_url, defaults.upstream.base_url);
        parsed.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[pipeline]\nnum_wanted = 5\n").unwrap();

        assert_eq!(parsed.pipeline.num_wanted, 5);
        assert_eq!(parsed.pipeline.num_workers, 10);
        assert_eq!(parsed.cache.ttl_secs, 300);
    }

    #[test]
    fn test_validate_rejects_hard_expiry_below_ttl() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 600;
        config.cache.hard_expiry_secs = 300;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hard_expiry_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.pipeline.num_workers = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_num_stories_override() {
        let config = AppConfig::default();

        assert_eq!(config.top_stories_config(None).fetch.num_wanted, 30);
        assert_eq!(config.top_stories_config(Some(5)).fetch.num_wanted, 5);
    }

    #[test]
    fn test_effective_config_round_trips_through_toml() {
        let rendered = AppConfig::default().to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.watch.refresh_interval_secs, 60);
    }
}
