use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use url::Url;

use super::{validate_url, MediaExtractor, MediaInfo, MediaSource};
use crate::utils::sanitize_filename;
use crate::Result;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "wav", "ogg", "opus", "aac", "flac", "mp4", "mov", "m4v", "webm",
];

/// Direct URL extractor for audio and video files
pub struct DirectExtractor {
    client: Client,
}

impl DirectExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Check if URL points to an audio or video file
    fn is_media_url(url: &Url) -> bool {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|filename| Path::new(filename).extension())
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                MEDIA_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// File size via HEAD request; servers that refuse HEAD are not an error
    async fn content_length(&self, url: &str) -> Option<u64> {
        let response = match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("HEAD {} returned HTTP {}", url, response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}", url, e);
                return None;
            }
        };

        response
            .headers()
            .get("content-length")
            .and_then(|cl| cl.to_str().ok())
            .and_then(|cl| cl.parse::<u64>().ok())
    }

    /// Title from the last path segment, without extension
    fn title_from_url(url: &Url) -> String {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|filename| !filename.is_empty())
            .map(|filename| {
                let name = match filename.rfind('.') {
                    Some(dot_pos) => &filename[..dot_pos],
                    None => filename,
                };
                urlencoding::decode(name)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| name.to_string())
                    .replace(['_', '-'], " ")
            })
            .map(|title| sanitize_filename(&title))
            .unwrap_or_else(|| "media".to_string())
    }
}

#[async_trait]
impl MediaExtractor for DirectExtractor {
    async fn extract_media_info(&self, input: &str) -> Result<MediaInfo> {
        let parsed_url = validate_url(input)?;
        let file_size = self.content_length(input).await;

        Ok(MediaInfo {
            platform: self.platform_name().to_string(),
            title: Self::title_from_url(&parsed_url),
            source: MediaSource::Remote {
                url: input.to_string(),
            },
            file_size,
            original_input: input.to_string(),
            share: None,
        })
    }

    fn supports_input(&self, input: &str) -> bool {
        validate_url(input)
            .map(|url| Self::is_media_url(&url))
            .unwrap_or(false)
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }
}

impl Default for DirectExtractor {
    fn default() -> Self {
        Self::new()
    }
}
