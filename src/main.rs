use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use vault_scribe::{
    Config, InputHints, ModelSize, PipelineCoordinator, PipelineError, ProcessingRequest,
    SourceAudio,
};

#[derive(Parser)]
#[command(name = "vault-scribe", about = "Audio recording to archive + transcript")]
struct Cli {
    /// Path to a config file (defaults are used when omitted)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe an existing audio file (no transcoding, no archiving)
    Transcribe {
        file: PathBuf,

        /// Recognizer language code (e.g. "ja", "en")
        #[arg(long)]
        language: Option<String>,

        /// Model size: tiny|base|small|medium|large
        #[arg(long)]
        model: Option<String>,
    },

    /// Treat a file's bytes as a fresh capture: transcode, archive, transcribe
    Process {
        file: PathBuf,

        /// Archive directory (relative paths resolve against base-dir)
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let (coordinator, mut events) = PipelineCoordinator::new(cfg.clone())?;
    let coordinator = Arc::new(coordinator);

    // Progress labels and engine diagnostics go to stderr as they arrive
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(progress) = events.progress.recv() => eprintln!("{}", progress.label),
                Some(error) = events.errors.recv() => eprintln!("error: {}", error.message),
                else => break,
            }
        }
    });

    // Ctrl-C terminates whatever the pipeline is running
    {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                coordinator.cancel();
            }
        });
    }

    let outcome = match cli.command {
        Command::Transcribe {
            file,
            language,
            model,
        } => {
            let request = build_request(
                &cfg,
                SourceAudio::File(file.clone()),
                language,
                model,
                None,
            )?;
            coordinator
                .transcribe_existing_file(&file, &request)
                .await
                .map(|transcript| {
                    println!("{}", transcript);
                })
        }

        Command::Process {
            file,
            archive_dir,
            language,
            model,
        } => {
            let request = build_request(
                &cfg,
                SourceAudio::File(file),
                language,
                model,
                archive_dir,
            )?;
            coordinator
                .process_captured_audio(&request)
                .await
                .map(|result| {
                    if let Some(archive) = &result.archive_audio {
                        info!("Archive audio: {} bytes", archive.len());
                    }
                    println!("{}", result.transcript);
                })
        }
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(PipelineError::Cancelled) => {
            eprintln!("cancelled");
            std::process::exit(130);
        }
        Err(err) => Err(err.into()),
    }
}

fn build_request(
    cfg: &Config,
    source: SourceAudio,
    language: Option<String>,
    model: Option<String>,
    archive_dir: Option<PathBuf>,
) -> Result<ProcessingRequest> {
    let model_size = match model {
        Some(raw) => ModelSize::from_str(&raw)
            .map_err(anyhow::Error::msg)
            .context("Invalid --model")?,
        None => cfg.transcription.model_size,
    };

    Ok(ProcessingRequest {
        source,
        language: language.unwrap_or_else(|| cfg.transcription.language.clone()),
        model_size,
        archive_dir: archive_dir.unwrap_or_else(|| cfg.transcription.archive_dir.clone()),
        hints: InputHints::default(),
    })
}
