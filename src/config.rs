use crate::pipeline::ModelSize;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

/// Locations of the external engines.
///
/// Interpreter and script are full paths: their existence is checked on
/// disk before anything is spawned.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    #[serde(default = "default_script")]
    pub script: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    /// Recognizer language code
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub model_size: ModelSize,

    /// Archive location for compressed recordings, relative to `base_dir`
    /// unless absolute
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Anchor for relative archive paths (the host vault root)
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Override for the process-wide scratch directory
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: default_script(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            model_size: ModelSize::default(),
            archive_dir: default_archive_dir(),
            base_dir: default_base_dir(),
            scratch_dir: None,
        }
    }
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("/usr/bin/python3")
}

fn default_script() -> PathBuf {
    PathBuf::from("/usr/local/bin/whisper")
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("04_assets/audio")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}
