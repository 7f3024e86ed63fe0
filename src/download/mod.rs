use anyhow::Context;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::{redirect, Client, StatusCode};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::config::DownloadConfig;
use crate::utils::{ensure_parent_dir, format_file_size};
use crate::{Result, TranscriptorError};

const MAX_REDIRECTS: usize = 10;

/// Fetches media files over HTTP with fixed browser headers
pub struct Downloader {
    client: Client,
    user_agent: String,
    referer: String,
    show_progress: bool,
}

impl Downloader {
    pub fn new(config: &DownloadConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("Failed to build download client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            referer: config.referer.clone(),
            show_progress: true,
        })
    }

    /// Hide the progress bar
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.show_progress = !quiet;
        self
    }

    /// Download `url` to `destination`. A failed transfer leaves no partial file behind.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        ensure_parent_dir(destination)?;

        tracing::info!("Downloading media to: {}", destination.display());
        match self.fetch(url, destination).await {
            Ok(written) => {
                tracing::info!("Downloaded {}", format_file_size(written));
                Ok(written)
            }
            Err(e) => {
                if destination.exists() {
                    if let Err(remove_err) = fs_err::remove_file(destination) {
                        tracing::warn!("Could not remove partial download: {}", remove_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referer)
            .send()
            .await
            .context("Download request failed")?;

        if response.status() != StatusCode::OK {
            return Err(TranscriptorError::Download(format!(
                "download failed: HTTP {}",
                response.status().as_u16()
            ))
            .into());
        }

        let progress = self.progress_bar(response.content_length());

        let mut file = fs_err::File::create(destination)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Download interrupted")?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }
        file.flush()?;

        progress.finish_with_message("Download complete");
        Ok(downloaded)
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        let progress = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
        };

        if !self.show_progress {
            progress.set_draw_target(ProgressDrawTarget::hidden());
        }
        progress.set_message("Downloading media...");
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested").join("clip.mp4");

        let config = DownloadConfig {
            timeout_secs: 2,
            ..DownloadConfig::default()
        };
        let downloader = Downloader::new(&config).unwrap().quiet(true);

        let result = downloader
            .download("http://127.0.0.1:9/clip.mp4", &destination)
            .await;

        assert!(result.is_err());
        assert!(!destination.exists());
        assert!(destination.parent().unwrap().exists());
    }
}
