use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub mod direct;
pub mod douyin;
pub mod local;

use crate::{Result, TranscriptorError};

/// Where the media bytes can be fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaSource {
    /// Needs a download first
    Remote { url: String },
    /// Already on disk
    Local { path: PathBuf },
}

/// Information about a resolved piece of media
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Platform that resolved the input
    pub platform: String,

    /// Title, already safe to use as a file name
    pub title: String,

    pub source: MediaSource,

    /// File size in bytes if available
    pub file_size: Option<u64>,

    /// Original input that was processed
    pub original_input: String,

    /// Share-page details when the input was a share link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<douyin::ResolvedMedia>,
}

/// Trait for resolving media from different inputs
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve an input into something downloadable or readable
    async fn extract_media_info(&self, input: &str) -> Result<MediaInfo>;

    /// Check if this extractor supports the given input
    fn supports_input(&self, input: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}

/// Registry for managing multiple extractors
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn MediaExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create a new registry with default extractors
    pub fn new(share: &crate::config::ShareConfig) -> anyhow::Result<Self> {
        let mut registry = Self::empty();

        // Order matters: share links first, then direct media, local files last
        registry.register(Box::new(douyin::DouyinExtractor::new(share)?));
        registry.register(Box::new(direct::DirectExtractor::new()));
        registry.register(Box::new(local::LocalFileExtractor::new()));

        Ok(registry)
    }

    /// Register a new extractor
    pub fn register(&mut self, extractor: Box<dyn MediaExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given input
    pub fn find_extractor(&self, input: &str) -> Option<&dyn MediaExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports_input(input))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .map(|extractor| extractor.platform_name())
            .collect()
    }

    /// Resolve input using the appropriate extractor
    pub async fn extract_media_info(&self, input: &str) -> Result<MediaInfo> {
        let input = input.trim();
        let extractor = self
            .find_extractor(input)
            .ok_or_else(|| TranscriptorError::UnsupportedInput(input.to_string()))?;

        tracing::info!("Resolving input with {} extractor", extractor.platform_name());
        extractor.extract_media_info(input).await
    }
}

/// Validate and normalize URLs
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}
