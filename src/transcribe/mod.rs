use anyhow::Context;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

use crate::asr::{RequestOptions, SpeechClient, TranscriptionResult};
use crate::config::Config;
use crate::download::Downloader;
use crate::extractors::{ExtractorRegistry, MediaInfo, MediaSource};
use crate::{Result, TranscriptorError};

const DEFAULT_MEDIA_EXTENSION: &str = "mp4";

/// Outcome of a full share-text run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub media: MediaInfo,

    /// Where the media ended up on disk
    pub media_path: PathBuf,

    /// False when the file lives in a temporary directory
    pub media_kept: bool,

    pub result: TranscriptionResult,
}

/// Main transcription pipeline: resolve, download, recognize
pub struct TranscriptionPipeline {
    config: Config,
    extractor_registry: ExtractorRegistry,
    downloader: Downloader,
    client: SpeechClient,
    temp_dir: TempDir,
}

impl TranscriptionPipeline {
    /// Create a new transcription pipeline
    pub fn new(config: Config, quiet: bool) -> anyhow::Result<Self> {
        let extractor_registry = ExtractorRegistry::new(&config.share)?;
        let downloader = Downloader::new(&config.download)?.quiet(quiet);
        let client = SpeechClient::new(config.asr_settings())?;

        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;

        Ok(Self {
            config,
            extractor_registry,
            downloader,
            client,
            temp_dir,
        })
    }

    /// Resolve share text, a media URL or a local path
    pub async fn resolve(&self, input: &str) -> Result<MediaInfo> {
        self.extractor_registry.extract_media_info(input).await
    }

    /// Make the media available on disk. Remote media goes to `output_dir`
    /// when videos are kept, to a temporary directory otherwise.
    pub async fn fetch_media(
        &self,
        media: &MediaInfo,
        output_dir: Option<&Path>,
    ) -> Result<(PathBuf, bool)> {
        let url = match &media.source {
            MediaSource::Local { path } => return Ok((path.clone(), true)),
            MediaSource::Remote { url } => url,
        };

        let keep = self.config.download.keep_video;
        let directory = if keep {
            output_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.config.download.output_dir.clone())
        } else {
            self.temp_dir.path().to_path_buf()
        };

        let destination = directory.join(format!("{}.{}", media.title, media_extension(url)));
        self.downloader.download(url, &destination).await?;

        Ok((destination, keep))
    }

    /// Recognize speech in an audio file
    pub async fn transcribe_file<F>(
        &self,
        path: &Path,
        options: RequestOptions,
        cancel: F,
    ) -> Result<TranscriptionResult>
    where
        F: Future<Output = ()>,
    {
        let request = self
            .client
            .prepare_file(path, options)
            .await
            .map_err(TranscriptorError::from)?;

        let result = self.client.transcribe_until(&request, cancel).await?;

        if result.is_success() {
            tracing::info!(
                request_id = %result.request_id,
                chars = result.result_text.chars().count(),
                "Transcription completed"
            );
        } else {
            tracing::warn!(
                request_id = %result.request_id,
                stage = %result.stage,
                http_status = ?result.http_status,
                api_status_code = %result.api_status_code,
                "Transcription failed"
            );
        }

        Ok(result)
    }

    /// Resolve, download and transcribe in one go. Credentials are checked
    /// before the share link is touched.
    pub async fn run<F>(
        &self,
        input: &str,
        options: RequestOptions,
        output_dir: Option<&Path>,
        cancel: F,
    ) -> Result<PipelineOutput>
    where
        F: Future<Output = ()>,
    {
        self.client
            .check_options(&options)
            .map_err(TranscriptorError::from)?;

        let media = self.resolve(input).await?;
        tracing::info!(platform = %media.platform, title = %media.title, "Resolved media");

        let (media_path, media_kept) = self.fetch_media(&media, output_dir).await?;
        let result = self.transcribe_file(&media_path, options, cancel).await?;

        Ok(PipelineOutput {
            media,
            media_path,
            media_kept,
            result,
        })
    }
}

/// File extension of a media URL, `mp4` when it has none
fn media_extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let filename = parsed.path_segments()?.next_back()?.to_string();
            let (_, ext) = filename.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            (!ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .then_some(ext)
        })
        .unwrap_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{Credentials, ModeChoice};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn options() -> RequestOptions {
        RequestOptions {
            mode: ModeChoice::Flash,
            resource_id: "volc.bigasr.auc_turbo".to_string(),
            model_name: "bigmodel".to_string(),
            credentials: Credentials {
                app_key: "app".to_string(),
                access_key: None,
            },
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_media_extension() {
        assert_eq!(media_extension("https://cdn.example.com/a/clip.MP3?x=1"), "mp3");
        assert_eq!(
            media_extension("https://aweme.snssdk.com/aweme/v1/play/?video_id=v0d00"),
            "mp4"
        );
        assert_eq!(media_extension("https://cdn.example.com/a/b.verylongext"), "mp4");
    }

    #[tokio::test]
    async fn test_local_media_is_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let pipeline = TranscriptionPipeline::new(Config::default(), true).unwrap();
        let media = pipeline.resolve(path.to_str().unwrap()).await.unwrap();
        let (fetched, kept) = pipeline.fetch_media(&media, None).await.unwrap();

        assert!(kept);
        assert_eq!(fetched, path.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_missing_access_key_fails_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let pipeline = TranscriptionPipeline::new(Config::default(), true).unwrap();
        let err = pipeline
            .transcribe_file(&path, options(), std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("access key"));
    }

    #[tokio::test]
    async fn test_run_rejects_missing_credentials_without_network() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let server = tokio::spawn(async move {
            while let Ok((_socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let pipeline = TranscriptionPipeline::new(Config::default(), true).unwrap();
        let err = pipeline
            .run(
                &format!("http://{}/clip.mp4", addr),
                options(),
                None,
                std::future::pending(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("access key"));
        assert_eq!(connections.load(Ordering::SeqCst), 0);
        server.abort();
    }
}
