//! End-to-end processing pipeline
//!
//! This module provides the `PipelineCoordinator`, the only surface the
//! host application talks to:
//! - `process_captured_audio`: scratch persist, dual transcode, archive copy,
//!   recognition, scratch cleanup
//! - `transcribe_existing_file`: recognition directly on an on-disk file
//! - `cancel`: cooperative termination of whatever is running
//!
//! Progress and engine diagnostics are delivered over ordered, advisory
//! event channels obtained at construction time.

mod coordinator;
mod error;
mod event;
mod request;

pub use coordinator::{archive_file_name, resolve_archive_dir, PipelineCoordinator, PipelineEvents};
pub use error::{PipelineError, PipelineResult};
pub use event::{ErrorEvent, ProgressEvent};
pub use request::{
    ModelSize, ProcessingRequest, ProcessingResult, RecordingSession, SourceAudio,
};
