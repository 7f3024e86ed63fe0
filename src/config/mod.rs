use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::asr::{
    mode::STANDARD_RESOURCE_ID, AsrSettings, AudioProfile, Endpoints, ModeChoice, PayloadBuilder,
    VendorCodes, MAX_AUDIO_BYTES,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speech recognition service
    pub asr: AsrConfig,

    /// Media download settings
    pub download: DownloadConfig,

    /// Share page scraping
    pub share: ShareConfig,

    /// Protocol defaults for the share-text `run` command
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    pub endpoints: Endpoints,

    /// Resource id sent in `X-Api-Resource-Id`
    pub resource_id: String,

    /// Resource id that `auto` mode routes to the standard protocol
    pub standard_resource_id: String,

    pub model_name: String,

    pub mode: ModeChoice,

    pub poll_interval_ms: u64,

    pub poll_timeout_ms: u64,

    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,

    /// Largest audio file accepted, in bytes
    pub max_file_size: u64,

    pub vendor_codes: VendorCodes,

    /// Audio description for standard-protocol jobs
    pub standard_profile: AudioProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where downloaded videos are kept
    pub output_dir: PathBuf,

    /// Keep videos after transcription
    pub keep_video: bool,

    pub timeout_secs: u64,

    pub user_agent: String,

    pub referer: String,
}

/// `run` talks to the standard protocol unless told otherwise, so an app key
/// alone is enough for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: ModeChoice,

    pub resource_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Share page prefix, the video id is appended
    pub page_base_url: String,

    pub user_agent: String,
}

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) EdgiOS/121.0.2277.107 Version/17.0 Mobile/15E148 Safari/604.1";

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            resource_id: "volc.bigasr.auc_turbo".to_string(),
            standard_resource_id: STANDARD_RESOURCE_ID.to_string(),
            model_name: "bigmodel".to_string(),
            mode: ModeChoice::Auto,
            poll_interval_ms: 1500,
            poll_timeout_ms: 120_000,
            http_timeout_secs: 300,
            max_file_size: MAX_AUDIO_BYTES,
            vendor_codes: VendorCodes::default(),
            standard_profile: AudioProfile::default(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            keep_video: true,
            timeout_secs: 60,
            user_agent: MOBILE_USER_AGENT.to_string(),
            referer: "https://www.douyin.com/".to_string(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ModeChoice::Standard,
            resource_id: STANDARD_RESOURCE_ID.to_string(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            page_base_url: "https://www.iesdouyin.com/share/video/".to_string(),
            user_agent: MOBILE_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, the default locations, or create a default
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                tracing::debug!("Could not write default config to {}: {}", config_path.display(), e);
            }
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("douyin-transcriptor").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let asr = &self.asr;

        if asr.poll_interval_ms == 0 {
            anyhow::bail!("asr.poll_interval_ms must be greater than zero");
        }
        if asr.poll_timeout_ms < asr.poll_interval_ms {
            anyhow::bail!(
                "asr.poll_timeout_ms ({}) must be at least one poll interval ({})",
                asr.poll_timeout_ms,
                asr.poll_interval_ms
            );
        }
        if asr.max_file_size == 0 {
            anyhow::bail!("asr.max_file_size must be greater than zero");
        }
        if asr.resource_id.trim().is_empty() {
            anyhow::bail!("asr.resource_id must not be empty");
        }
        if self.run.resource_id.trim().is_empty() {
            anyhow::bail!("run.resource_id must not be empty");
        }

        for (name, value) in [
            ("asr.endpoints.flash_url", &asr.endpoints.flash_url),
            ("asr.endpoints.submit_url", &asr.endpoints.submit_url),
            ("asr.endpoints.query_url", &asr.endpoints.query_url),
            ("share.page_base_url", &self.share.page_base_url),
        ] {
            Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Resource ID: {}", self.asr.resource_id);
        println!("  Standard Resource ID: {}", self.asr.standard_resource_id);
        println!("  Model: {}", self.asr.model_name);
        println!("  Mode: {}", self.asr.mode);
        println!(
            "  Run Defaults: {} mode, resource {}",
            self.run.mode, self.run.resource_id
        );
        println!("  Flash Endpoint: {}", self.asr.endpoints.flash_url);
        println!("  Submit Endpoint: {}", self.asr.endpoints.submit_url);
        println!("  Query Endpoint: {}", self.asr.endpoints.query_url);
        println!(
            "  Polling: every {}ms, give up after {}ms",
            self.asr.poll_interval_ms, self.asr.poll_timeout_ms
        );
        println!("  Download Dir: {}", self.download.output_dir.display());
        println!("  Keep Video: {}", self.download.keep_video);
    }

    /// Service settings for [`crate::asr::SpeechClient`]
    pub fn asr_settings(&self) -> AsrSettings {
        AsrSettings {
            endpoints: self.asr.endpoints.clone(),
            vendor_codes: self.asr.vendor_codes.clone(),
            payload: PayloadBuilder::new(self.asr.standard_profile.clone()),
            standard_resource_id: self.asr.standard_resource_id.clone(),
            max_file_size: self.asr.max_file_size,
            http_timeout: Duration::from_secs(self.asr.http_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.asr.poll_interval_ms, 1500);
        assert_eq!(config.asr.poll_timeout_ms, 120_000);
        assert_eq!(config.asr.mode, ModeChoice::Auto);
        assert_eq!(config.run.mode, ModeChoice::Standard);
        assert_eq!(config.run.resource_id, STANDARD_RESOURCE_ID);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(
            &path,
            "asr:\n  mode: standard\n  poll_interval_ms: 500\n  vendor_codes:\n    complete: \"1\"\n    in_progress: \"2\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.asr.mode, ModeChoice::Standard);
        assert_eq!(config.asr.poll_interval_ms, 500);
        assert_eq!(config.asr.poll_timeout_ms, 120_000);
        assert_eq!(config.asr.vendor_codes.complete, "1");
        assert_eq!(config.asr.model_name, "bigmodel");
        assert_eq!(config.download.referer, "https://www.douyin.com/");
    }

    #[test]
    fn test_validate_rejects_bad_polling() {
        let mut config = Config::default();
        config.asr.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.asr.poll_interval_ms = 2000;
        config.asr.poll_timeout_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.asr.endpoints.query_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("asr.endpoints.query_url"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.asr.resource_id = "volc.seedasr.auc".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.asr.resource_id, "volc.seedasr.auc");
    }

    #[test]
    fn test_asr_settings_carry_profile() {
        let mut config = Config::default();
        config.asr.standard_profile.format = "mp3".to_string();
        let settings = config.asr_settings();
        assert_eq!(settings.payload.profile().format, "mp3");
        assert_eq!(settings.standard_resource_id, STANDARD_RESOURCE_ID);
    }
}
