//! Media transcoding via an external ffmpeg engine
//!
//! Two conversions run against the same input:
//! - Archive: compressed MP3 at a fixed bitrate, source channel layout
//! - Normalized: mono 16kHz PCM WAV, the format the recognizer requires
//!
//! Both report percent-complete from the engine's machine-readable progress
//! stream, measured against a duration probe that runs concurrently with
//! the engine spawn.

mod ffmpeg;

pub(crate) use ffmpeg::spawn_error;
pub use ffmpeg::{probe_duration, transcode_args, InputHints, TranscodeTarget, Transcoder};
