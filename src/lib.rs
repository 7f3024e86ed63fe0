//! Douyin Transcriptor - A Rust CLI tool for transcribing Douyin videos and audio files
//!
//! This library resolves Douyin share text to a downloadable video and transcribes
//! audio with the Volcengine speech recognition service, over either the
//! synchronous flash protocol or the submit/query standard protocol.

pub mod asr;
pub mod cli;
pub mod config;
pub mod download;
pub mod extractors;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use asr::{
    Cancelled, InputError, Mode, ModeChoice, RequestOptions, SpeechClient, TranscriptionRequest,
    TranscriptionResult,
};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{MediaExtractor, MediaInfo};
pub use transcribe::{PipelineOutput, TranscriptionPipeline};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the transcriptor
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Share link resolution failed: {0}")]
    ShareResolution(String),

    #[error("{0}")]
    Download(String),

    #[error(transparent)]
    Input(#[from] InputError),
}
