use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::asr::{Credentials, ModeChoice, RequestOptions};
use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "transcriptor",
    about = "Douyin Transcriptor - Turn Douyin share links and audio files into text with Volcengine speech recognition",
    version,
    long_about = "A CLI tool that resolves Douyin share text to a watermark-free video, downloads it and transcribes it with the Volcengine speech recognition API. Supports both the synchronous flash protocol and the submit/query standard protocol."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators and informational logs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a local audio or video file and print the result record
    Transcribe {
        /// Audio or video file to transcribe
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Save the full result record as JSON
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Save only the transcript text
        #[arg(long, value_name = "FILE")]
        text_out: Option<PathBuf>,

        #[command(flatten)]
        asr: AsrArgs,
    },

    /// Resolve share text, download the video and print its transcript
    Run {
        /// Share text copied from the app, or a direct media URL
        #[arg(value_name = "SHARE_TEXT")]
        share_text: String,

        /// Save the full result record as JSON
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Save only the transcript text
        #[arg(long, value_name = "FILE")]
        text_out: Option<PathBuf>,

        /// Directory for downloaded videos (overrides the config file)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        asr: AsrArgs,
    },

    /// Resolve share text to a video download address
    Resolve {
        /// Share text copied from the app
        #[arg(value_name = "SHARE_TEXT")]
        share_text: String,
    },

    /// Download a single media URL
    Download {
        #[arg(value_name = "URL")]
        url: String,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported inputs
    Platforms,
}

/// Speech recognition options shared by `transcribe` and `run`
#[derive(Args, Debug, Clone, Default)]
pub struct AsrArgs {
    /// Application key (the app id)
    #[arg(long, env = "VOLC_APP_KEY", hide_env_values = true)]
    pub app_key: Option<String>,

    /// Access key, required by the flash protocol
    #[arg(long, env = "VOLC_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Resource id; the standard resource id selects the standard protocol in auto mode
    #[arg(long, env = "VOLC_RESOURCE_ID")]
    pub resource_id: Option<String>,

    /// Recognition model name
    #[arg(long = "model", env = "VOLC_ASR_MODEL_NAME", value_name = "NAME")]
    pub model_name: Option<String>,

    /// Protocol to use
    #[arg(long, value_enum, env = "VOLC_ASR_MODE")]
    pub mode: Option<ModeChoice>,

    /// Delay between status queries (standard protocol)
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Give up polling after this long (standard protocol)
    #[arg(long, value_name = "MS")]
    pub poll_timeout_ms: Option<u64>,
}

impl AsrArgs {
    /// Merge flags and environment over the config file
    pub fn request_options(&self, config: &Config) -> anyhow::Result<RequestOptions> {
        self.merge(config, config.asr.mode, &config.asr.resource_id)
    }

    /// Same as [`request_options`](Self::request_options), but mode and
    /// resource fall back to the `run` section (standard protocol)
    pub fn run_options(&self, config: &Config) -> anyhow::Result<RequestOptions> {
        self.merge(config, config.run.mode, &config.run.resource_id)
    }

    fn merge(
        &self,
        config: &Config,
        default_mode: ModeChoice,
        default_resource_id: &str,
    ) -> anyhow::Result<RequestOptions> {
        let asr = &config.asr;

        let poll_interval_ms = self.poll_interval_ms.unwrap_or(asr.poll_interval_ms);
        let poll_timeout_ms = self.poll_timeout_ms.unwrap_or(asr.poll_timeout_ms);
        if poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than zero");
        }
        if poll_timeout_ms < poll_interval_ms {
            anyhow::bail!(
                "--poll-timeout-ms ({}) must be at least one poll interval ({})",
                poll_timeout_ms,
                poll_interval_ms
            );
        }

        Ok(RequestOptions {
            mode: self.mode.unwrap_or(default_mode),
            resource_id: non_empty(&self.resource_id)
                .unwrap_or_else(|| default_resource_id.to_string()),
            model_name: non_empty(&self.model_name).unwrap_or_else(|| asr.model_name.clone()),
            credentials: Credentials {
                app_key: self.app_key.clone().unwrap_or_default(),
                access_key: self.access_key.clone(),
            },
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_timeout: Duration::from_millis(poll_timeout_ms),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
