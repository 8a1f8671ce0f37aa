use crate::models::EntryDraft;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid metadata URL '{0}'")]
    InvalidUrl(String),

    #[error("metadata source is not configured")]
    Unavailable,

    #[error("metadata source failed: {0}")]
    Upstream(String),
}

/// External source that turns a page URL into draft fields.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<MetadataRecord, FetchError>;
}

/// Fields a metadata source may supply. Absent fields leave a draft untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub rating: Option<f64>,
    pub poster: Option<String>,
    pub desc: Option<String>,
    pub director: Option<String>,
    pub screenwriter: Option<String>,
    pub cast: Option<Vec<String>>,
    pub year: Option<String>,
    pub genre: Option<Vec<String>>,
}

impl MetadataRecord {
    /// Copies every present field verbatim into `draft`.
    pub fn apply_to(&self, draft: &mut EntryDraft) {
        if let Some(v) = &self.title {
            draft.title = v.clone();
        }
        if let Some(v) = &self.original_title {
            draft.original_title = v.clone();
        }
        if let Some(v) = self.rating {
            draft.rating = v;
        }
        if let Some(v) = &self.poster {
            draft.poster = Some(v.clone());
        }
        if let Some(v) = &self.desc {
            draft.desc = v.clone();
        }
        if let Some(v) = &self.director {
            draft.director = v.clone();
        }
        if let Some(v) = &self.screenwriter {
            draft.screenwriter = v.clone();
        }
        if let Some(v) = &self.cast {
            draft.cast = v.clone();
        }
        if let Some(v) = &self.year {
            draft.year = v.clone();
        }
        if let Some(v) = &self.genre {
            draft.genre = v.clone();
        }
    }
}

/// Returns one configured record for every well-formed URL, after a delay
/// that stands in for network latency.
#[derive(Debug, Clone)]
pub struct FixtureMetadataSource {
    record: MetadataRecord,
    latency: Duration,
}

impl FixtureMetadataSource {
    pub fn new(record: MetadataRecord, latency: Duration) -> Self {
        Self { record, latency }
    }

    pub fn from_file(path: &Path, latency: Duration) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read metadata fixture {}: {}", path.display(), e)
        })?;
        let record: MetadataRecord = serde_json::from_str(&raw).map_err(|e| {
            anyhow::anyhow!("Invalid metadata fixture {}: {}", path.display(), e)
        })?;
        info!("Loaded metadata fixture from {}", path.display());
        Ok(Self::new(record, latency))
    }
}

#[async_trait]
impl MetadataSource for FixtureMetadataSource {
    async fn fetch(&self, url: &str) -> Result<MetadataRecord, FetchError> {
        let parsed = parse_source_url(url)?;
        debug!("Fetching fixture metadata for {}", parsed);
        tokio::time::sleep(self.latency).await;
        Ok(self.record.clone())
    }
}

/// Source used when nothing is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMetadataSource;

#[async_trait]
impl MetadataSource for DisabledMetadataSource {
    async fn fetch(&self, url: &str) -> Result<MetadataRecord, FetchError> {
        parse_source_url(url)?;
        Err(FetchError::Unavailable)
    }
}

/// Accepts absolute http(s) URLs only.
pub fn parse_source_url(input: &str) -> Result<url::Url, FetchError> {
    let trimmed = input.trim();
    let parsed =
        url::Url::parse(trimmed).map_err(|_| FetchError::InvalidUrl(trimmed.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(trimmed.to_string())),
    }
}
