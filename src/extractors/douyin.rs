use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use super::{MediaExtractor, MediaInfo, MediaSource};
use crate::config::ShareConfig;
use crate::utils::{extract_domain, extract_first_url, tidy_title, MAX_TITLE_BYTES};
use crate::{Result, TranscriptorError};

const VIDEO_PAGE_KEY: &str = "video_(id)/page";
const NOTE_PAGE_KEY: &str = "note_(id)/page";

/// Everything learned while resolving a share link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub video_id: String,
    pub title: String,
    /// Watermark-free play address
    pub download_url: String,
    /// Play address as listed on the page
    pub raw_url: String,
    pub share_url: String,
    pub redirected_url: String,
    pub page_url: String,
}

/// Douyin share text resolver
pub struct DouyinExtractor {
    client: Client,
    page_base_url: String,
    user_agent: String,
}

impl DouyinExtractor {
    pub fn new(config: &ShareConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            page_base_url: config.page_base_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    /// Follow the share link and scrape the share page
    pub async fn resolve_share_text(&self, share_text: &str) -> Result<ResolvedMedia> {
        let share_url = extract_first_url(share_text)
            .ok_or_else(|| share_error("no share link found in input"))?;

        tracing::debug!("Following share link: {}", share_url);
        let response = self
            .client
            .get(&share_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Failed to open share link")?;

        if !response.status().is_success() {
            return Err(share_error(format!(
                "share link returned HTTP {}",
                response.status()
            )));
        }

        let redirected_url = response.url().to_string();
        let video_id = parse_video_id(&redirected_url)?;
        tracing::debug!(video_id = %video_id, "Resolved share link");

        let page_url = format!("{}{}", self.page_base_url, video_id);
        let response = self
            .client
            .get(&page_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .context("Failed to fetch share page")?;

        if !response.status().is_success() {
            return Err(share_error(format!(
                "share page returned HTTP {}",
                response.status()
            )));
        }

        let html = response.text().await.context("Failed to read share page")?;
        let (title, raw_url, download_url) = resolve_page(&html, &video_id)?;

        Ok(ResolvedMedia {
            title,
            download_url,
            raw_url,
            video_id,
            share_url,
            redirected_url,
            page_url,
        })
    }
}

fn share_error(message: impl Into<String>) -> anyhow::Error {
    TranscriptorError::ShareResolution(message.into()).into()
}

/// Video id from the URL a share link redirects to.
///
/// The id is the last path segment, or the one before it when the path ends
/// in `video` or `note`.
pub fn parse_video_id(final_url: &str) -> Result<String> {
    let url = Url::parse(final_url)
        .map_err(|_| share_error(format!("cannot parse redirected URL: {}", final_url)))?;

    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let mut index = parts
        .len()
        .checked_sub(1)
        .ok_or_else(|| share_error(format!("redirected URL has no path: {}", final_url)))?;

    if matches!(parts[index], "video" | "note") && index >= 1 {
        index -= 1;
    }

    Ok(parts[index].to_string())
}

/// JSON assigned to `window._ROUTER_DATA` in the share page
pub fn extract_router_data(html: &str) -> Result<Value> {
    static ROUTER_RE: OnceLock<Regex> = OnceLock::new();
    let re = ROUTER_RE.get_or_init(|| {
        Regex::new(r"(?s)window\._ROUTER_DATA\s*=\s*(.*?)</script>")
            .expect("router data pattern is valid")
    });

    let raw = re
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| share_error("window._ROUTER_DATA not found in share page"))?;

    let raw = raw.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    serde_json::from_str(raw)
        .map_err(|e| share_error(format!("window._ROUTER_DATA is not valid JSON: {}", e)))
}

/// Locate `videoInfoRes`: video page, then note page, then any loader entry
pub fn pick_video_info(router_data: &Value) -> Result<&Value> {
    let loader = router_data
        .get("loaderData")
        .and_then(Value::as_object)
        .ok_or_else(|| share_error("window._ROUTER_DATA has no loaderData"))?;

    let info = [VIDEO_PAGE_KEY, NOTE_PAGE_KEY]
        .into_iter()
        .filter_map(|key| loader.get(key))
        .chain(loader.values())
        .find_map(|entry| entry.get("videoInfoRes").filter(|v| !v.is_null()));

    info.ok_or_else(|| share_error("videoInfoRes not found in loaderData"))
}

fn first_item(router_data: &Value) -> Result<&Value> {
    pick_video_info(router_data)?
        .get("item_list")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .ok_or_else(|| share_error("videoInfoRes.item_list is empty"))
}

fn play_url(item: &Value) -> Result<String> {
    item.pointer("/video/play_addr/url_list/0")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| share_error("item has no video.play_addr.url_list[0]"))
}

fn title_for(item: &Value, video_id: &str) -> String {
    item.get("desc")
        .and_then(Value::as_str)
        .map(|desc| tidy_title(desc, MAX_TITLE_BYTES))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("douyin_{}", video_id))
}

/// Title, listed play URL and watermark-free play URL from a share page
pub fn resolve_page(html: &str, video_id: &str) -> Result<(String, String, String)> {
    let router_data = extract_router_data(html)?;
    let item = first_item(&router_data)?;
    let raw_url = play_url(item)?;
    let download_url = raw_url.replace("playwm", "play");
    Ok((title_for(item, video_id), raw_url, download_url))
}

#[async_trait]
impl MediaExtractor for DouyinExtractor {
    async fn extract_media_info(&self, input: &str) -> Result<MediaInfo> {
        let resolved = self.resolve_share_text(input).await?;

        Ok(MediaInfo {
            platform: self.platform_name().to_string(),
            title: resolved.title.clone(),
            source: MediaSource::Remote {
                url: resolved.download_url.clone(),
            },
            file_size: None,
            original_input: input.to_string(),
            share: Some(resolved),
        })
    }

    fn supports_input(&self, input: &str) -> bool {
        extract_first_url(input)
            .and_then(|url| extract_domain(&url))
            .map(|domain| {
                domain == "douyin.com"
                    || domain.ends_with(".douyin.com")
                    || domain.ends_with("iesdouyin.com")
            })
            .unwrap_or(false)
    }

    fn platform_name(&self) -> &'static str {
        "Douyin"
    }
}
