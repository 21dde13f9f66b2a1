pub mod config;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod transcode;
pub mod transcribe;

pub use config::{Config, RecognizerConfig, TranscriptionConfig};
pub use pipeline::{
    archive_file_name, resolve_archive_dir, ErrorEvent, ModelSize, PipelineCoordinator,
    PipelineError, PipelineEvents, PipelineResult, ProcessingRequest, ProcessingResult,
    ProgressEvent, RecordingSession, SourceAudio,
};
pub use process::{ProcessRole, ProcessSupervisor};
pub use progress::{LineBuffer, ProgressTracker};
pub use transcode::{InputHints, TranscodeTarget, Transcoder};
pub use transcribe::TranscriptionRunner;
