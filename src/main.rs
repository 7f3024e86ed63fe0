use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use douyin_transcriptor::cli::{Cli, Commands};
use douyin_transcriptor::config::Config;
use douyin_transcriptor::download::Downloader;
use douyin_transcriptor::extractors::ExtractorRegistry;
use douyin_transcriptor::output;
use douyin_transcriptor::transcribe::TranscriptionPipeline;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "douyin_transcriptor=debug"
    } else if cli.quiet {
        "douyin_transcriptor=warn"
    } else {
        "douyin_transcriptor=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::debug!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::warn!("Interrupted, stopping after the current request");
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Transcribe {
            file,
            out,
            text_out,
            asr,
        } => {
            let options = asr.request_options(&config)?;
            let pipeline = TranscriptionPipeline::new(config, cli.quiet)?;

            tracing::info!("Starting transcription for file: {}", file.display());
            let result = pipeline
                .transcribe_file(&file, options, shutdown_signal())
                .await?;

            output::persist(&result, out.as_deref(), text_out.as_deref())?;
            output::emit(&result)?;

            Ok(exit_code(result.is_success()))
        }
        Commands::Run {
            share_text,
            out,
            text_out,
            output_dir,
            asr,
        } => {
            let options = asr.run_options(&config)?;
            let pipeline = TranscriptionPipeline::new(config, cli.quiet)?;

            let run = pipeline
                .run(&share_text, options, output_dir.as_deref(), shutdown_signal())
                .await?;
            if run.media_kept {
                tracing::info!("Media saved to: {}", run.media_path.display());
            }

            output::persist(&run.result, out.as_deref(), text_out.as_deref())?;

            if !run.result.is_success() {
                output::emit(&run.result)?;
                return Ok(ExitCode::FAILURE);
            }
            if run.result.result_text.trim().is_empty() {
                anyhow::bail!("transcription finished without any text");
            }

            println!("{}", run.result.result_text);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { share_text } => {
            let registry = ExtractorRegistry::new(&config.share)?;
            let media = registry.extract_media_info(&share_text).await?;

            match &media.share {
                Some(resolved) => output::print_json(resolved)?,
                None => output::print_json(&media)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download { url, output: destination } => {
            let downloader = Downloader::new(&config.download)?.quiet(cli.quiet);
            downloader
                .download(&url, &destination)
                .await
                .with_context(|| format!("Failed to download {}", url))?;

            output::print_json(&json!({
                "status": "success",
                "path": destination.display().to_string(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Configuration file: {}", path.display());
                println!("Credentials are read from VOLC_APP_KEY and VOLC_ACCESS_KEY (or --app-key / --access-key).");
                println!("Run `transcriptor config --show` to print the current settings.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Platforms => {
            let registry = ExtractorRegistry::new(&config.share)?;
            println!("Supported inputs:");
            for platform in registry.list_platforms() {
                println!("  • {}", platform);
            }
            println!("  (share text from the Douyin app, direct media URLs, local audio/video files)");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
