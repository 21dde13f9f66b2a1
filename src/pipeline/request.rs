use crate::transcode::InputHints;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A finished capture handed over by the host application.
///
/// Consumed by the pipeline: once the raw bytes are materialized in the
/// scratch directory the session has served its purpose.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Raw audio bytes in whatever container the host recorded
    pub bytes: Vec<u8>,

    /// When the capture stopped
    pub captured_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            captured_at: Utc::now(),
        }
    }
}

/// Recognizer model size. Passed verbatim as the model id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(format!(
                "unknown model size '{}' (expected tiny|base|small|medium|large)",
                other
            )),
        }
    }
}

/// Audio input to one pipeline invocation.
#[derive(Debug, Clone)]
pub enum SourceAudio {
    /// Raw bytes from a fresh capture, with the container extension the
    /// host recorded in (e.g. "webm", "ogg")
    Bytes { data: Vec<u8>, extension: String },

    /// An existing file on disk
    File(PathBuf),
}

impl SourceAudio {
    pub fn from_session(session: RecordingSession, extension: impl Into<String>) -> Self {
        SourceAudio::Bytes {
            data: session.bytes,
            extension: extension.into(),
        }
    }
}

/// Immutable description of one processing run.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub source: SourceAudio,

    /// Recognizer language code (e.g. "ja", "en")
    pub language: String,

    pub model_size: ModelSize,

    /// Long-term storage location for the compressed recording. Relative
    /// paths are resolved against the configured base directory.
    pub archive_dir: PathBuf,

    /// Explicit container/codec hints for the transcoder input
    pub hints: InputHints,
}

/// What a completed invocation hands back to the caller.
#[derive(Debug)]
pub struct ProcessingResult {
    /// Trimmed transcript text from the recognizer's result artifact
    pub transcript: String,

    /// Compressed archive bytes; absent when transcribing an existing file
    pub archive_audio: Option<Vec<u8>>,
}
