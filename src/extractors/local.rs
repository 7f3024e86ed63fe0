use super::{MediaExtractor, MediaInfo, MediaSource};
use crate::utils::sanitize_filename;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// Audio or video file that is already on disk
pub struct LocalFileExtractor;

impl LocalFileExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check if input looks like a local file path
    pub fn is_local_file(input: &str) -> bool {
        // First, check if it's clearly a URL
        if input.starts_with("http://") || input.starts_with("https://") {
            return false;
        }

        // Check if the file exists (handles both absolute and relative paths)
        let path = Path::new(input);
        if path.exists() {
            return true;
        }

        // Check if it looks like a file path (has file extension or path separators)
        let has_extension = path.extension().is_some();
        let has_path_separators = input.contains('/') || input.contains('\\');

        !input.contains(char::is_whitespace) && (has_extension || has_path_separators)
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| anyhow::anyhow!("Cannot access file {}: {}", path.display(), e))?;

        if !metadata.is_file() {
            anyhow::bail!("Path is not a file: {}", path.display());
        }
        if metadata.len() == 0 {
            anyhow::bail!("File is empty: {}", path.display());
        }

        Ok(metadata.len())
    }
}

#[async_trait]
impl MediaExtractor for LocalFileExtractor {
    async fn extract_media_info(&self, input: &str) -> Result<MediaInfo> {
        let file_path = Path::new(input);
        let file_size = self.validate_file(file_path).await?;

        let title = file_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_filename)
            .unwrap_or_else(|| "local file".to_string());

        let absolute_path = file_path
            .canonicalize()
            .unwrap_or_else(|_| file_path.to_path_buf());

        Ok(MediaInfo {
            platform: self.platform_name().to_string(),
            title,
            source: MediaSource::Local {
                path: absolute_path,
            },
            file_size: Some(file_size),
            original_input: input.to_string(),
            share: None,
        })
    }

    fn supports_input(&self, input: &str) -> bool {
        Self::is_local_file(input)
    }

    fn platform_name(&self) -> &'static str {
        "Local File"
    }
}

impl Default for LocalFileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_file() {
        assert!(LocalFileExtractor::is_local_file("./clip.mp4"));
        assert!(LocalFileExtractor::is_local_file("downloads/clip"));
        assert!(!LocalFileExtractor::is_local_file("https://example.com/clip.mp4"));
        assert!(!LocalFileExtractor::is_local_file("看看 https://v.douyin.com/x/"));
    }

    #[tokio::test]
    async fn test_extract_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interview:part1.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let info = LocalFileExtractor::new()
            .extract_media_info(path.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(info.title, "interview_part1");
        assert_eq!(info.file_size, Some(3));
        assert!(matches!(info.source, MediaSource::Local { .. }));
    }

    #[tokio::test]
    async fn test_rejects_empty_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.mp3");
        std::fs::write(&empty, b"").unwrap();

        let extractor = LocalFileExtractor::new();
        assert!(extractor.extract_media_info(empty.to_str().unwrap()).await.is_err());
        assert!(extractor
            .extract_media_info(dir.path().join("missing.mp3").to_str().unwrap())
            .await
            .is_err());
        assert!(extractor.extract_media_info(dir.path().to_str().unwrap()).await.is_err());
    }
}
