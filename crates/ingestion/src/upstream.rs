//! Upstream feed client
//!
//! Tries an ordered list of endpoint variants and returns the first payload
//! that is HTTP 200 with a non-empty `posts` array. When every variant
//! fails the local snapshot file is used instead.

use crate::errors::{IngestionError, Result};
use crate::payload::{FeedPayload, RawPost};
use async_trait::async_trait;
use chrono::Utc;
use moltwatch_common::config::UpstreamConfig;
use moltwatch_common::metrics;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Posts of one fetch and where they came from
#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    pub posts: Vec<RawPost>,
    /// Posts were read from the local snapshot, not a live endpoint
    pub from_cache: bool,
}

impl FetchedBatch {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Source of raw posts for an ingestion cycle
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current feed. Never fails; an unavailable feed yields an
    /// empty batch.
    async fn fetch(&self) -> FetchedBatch;
}

/// HTTP client for the upstream feed
pub struct UpstreamClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
    snapshot_path: Option<PathBuf>,
    refresh_snapshot: bool,
}

impl UpstreamClient {
    /// Create a new client from configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| IngestionError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            snapshot_path: config.snapshot_path.clone(),
            refresh_snapshot: config.refresh_snapshot,
        })
    }

    /// Request one endpoint and return the raw body with its parsed posts
    async fn try_endpoint(&self, url: &str) -> Result<(Vec<RawPost>, Vec<u8>)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestionError::UpstreamError(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IngestionError::UpstreamError(format!("status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IngestionError::UpstreamError(e.to_string()))?;

        let payload: FeedPayload = serde_json::from_slice(&body)?;
        if payload.posts.is_empty() {
            return Err(IngestionError::UpstreamError("empty post list".to_string()));
        }

        Ok((payload.posts, body.to_vec()))
    }

    /// Walk the endpoint variants in order; first acceptance wins
    async fn fetch_live(&self) -> Option<(Vec<RawPost>, Vec<u8>)> {
        for template in &self.endpoints {
            let url = expand_endpoint(template, Utc::now().timestamp());
            debug!(url = %url, "Fetching feed");

            match self.try_endpoint(&url).await {
                Ok(result) => {
                    metrics::record_upstream_attempt("accepted");
                    info!(url = %url, posts = result.0.len(), "Feed endpoint accepted");
                    return Some(result);
                }
                Err(e) => {
                    metrics::record_upstream_attempt("rejected");
                    warn!(url = %url, error = %e, "Feed endpoint rejected");
                }
            }
        }

        None
    }

    async fn fetch_snapshot(&self) -> Vec<RawPost> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Vec::new();
        };

        match read_snapshot(path).await {
            Ok(posts) => posts,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Snapshot unavailable");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl FeedSource for UpstreamClient {
    #[instrument(skip(self), fields(endpoints = self.endpoints.len()))]
    async fn fetch(&self) -> FetchedBatch {
        if let Some((posts, body)) = self.fetch_live().await {
            if self.refresh_snapshot {
                if let Some(path) = self.snapshot_path.as_deref() {
                    if let Err(e) = write_snapshot(path, &body).await {
                        warn!(path = %path.display(), error = %e, "Failed to refresh snapshot");
                    }
                }
            }

            return FetchedBatch {
                posts,
                from_cache: false,
            };
        }

        let posts = self.fetch_snapshot().await;
        if posts.is_empty() {
            warn!("All feed endpoints failed and no snapshot is available");
            return FetchedBatch::default();
        }

        warn!(posts = posts.len(), "All feed endpoints failed, using cached snapshot");
        FetchedBatch {
            posts,
            from_cache: true,
        }
    }
}

fn default_headers(config: &UpstreamConfig) -> Result<HeaderMap> {
    let value = |v: &str| {
        HeaderValue::from_str(v)
            .map_err(|e| {
                IngestionError::ConfigError(format!("Invalid header value {:?}: {}", v, e))
            })
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, value(&config.user_agent)?);
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(header::REFERER, value(&config.referer)?);
    Ok(headers)
}

/// Substitute the `{ts}` cache-busting placeholder
pub fn expand_endpoint(template: &str, unix_ts: i64) -> String {
    template.replace("{ts}", &unix_ts.to_string())
}

/// Read posts from a snapshot file in feed format
pub async fn read_snapshot(path: &Path) -> Result<Vec<RawPost>> {
    let body = tokio::fs::read(path)
        .await
        .map_err(|e| IngestionError::SnapshotError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let payload: FeedPayload = serde_json::from_slice(&body)?;
    Ok(payload.posts)
}

/// Replace the snapshot file atomically
pub async fn write_snapshot(path: &Path, body: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(path = %path.display(), bytes = body.len(), "Snapshot refreshed");
    Ok(())
}
