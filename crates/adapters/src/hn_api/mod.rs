//! Hacker News API item source

use async_trait::async_trait;
use quiet_hn_domain::{ItemSource, RawItem, StoryId, UpstreamError};
use reqwest::{Client, Response};
use std::time::Duration;

/// Public Hacker News API root
pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Item source backed by the Hacker News Firebase API
pub struct HnItemSource {
    client: Client,
    base_url: String,
}

impl HnItemSource {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), timeout)
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quiet-hn/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, context: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let response = check_status(response, context)?;

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(body.to_vec())
    }
}

fn check_status(response: Response, context: &str) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status {
            status: status.as_u16(),
            context: context.to_string(),
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8], context: &str) -> Result<T, UpstreamError> {
    serde_json::from_slice(body).map_err(|e| UpstreamError::Decode {
        context: context.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ItemSource for HnItemSource {
    async fn list_top_ids(&self) -> Result<Vec<StoryId>, UpstreamError> {
        let url = format!("{}/topstories.json", self.base_url);
        let body = self.get(&url, "top stories").await?;
        let ids: Vec<StoryId> = decode(&body, "top stories")?;

        tracing::debug!(count = ids.len(), "Fetched top story ids");

        Ok(ids)
    }

    async fn get_item(&self, id: StoryId) -> Result<RawItem, UpstreamError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let context = format!("item {}", id);
        let body = self.get(&url, &context).await?;

        // Deleted or unknown items come back as a literal `null`
        let item: Option<RawItem> = decode(&body, &context)?;
        item.ok_or(UpstreamError::NotFound(id))
    }
}
