//! Speech recognition via an external recognizer process
//!
//! The recognizer is a black-box CLI (an interpreter plus a script) that
//! consumes a mono 16kHz WAV, prints timestamped segment lines as it works,
//! and writes the final transcript to `<input-basename>.txt` in the scratch
//! directory. This module streams its output line-by-line, turns timestamp
//! ranges into progress events, and reads the result artifact back once the
//! process exits.

mod runner;

pub use runner::{extract_failure_message, recognizer_args, TranscriptionRunner};
