use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Terminal states of one pipeline invocation, minus success.
///
/// `Cancelled` is deliberately part of this enum but is not a failure: the
/// coordinator surfaces it as a neutral notice, never as an error report,
/// and no partial transcript accompanies it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required external binary is absent. Checked before any process is
    /// spawned, so no partial state exists.
    #[error("missing dependency: {name} not found at {path}")]
    DependencyMissing { name: String, path: PathBuf },

    /// The transcoding engine exited non-zero or its output file is absent.
    #[error("transcoding failed: {message}")]
    Transcode { message: String },

    /// The archive directory could not be created or populated.
    #[error("cannot write archive to {dir}: {source}")]
    ArchiveWrite {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The recognizer exited 0 but wrote no result artifact.
    #[error("recognizer reported success but produced no output at {path}")]
    ResultArtifactMissing { path: PathBuf },

    /// The recognizer exited non-zero; the message is extracted best-effort
    /// from its accumulated output.
    #[error("recognition failed: {message}")]
    RecognitionFailed { message: String },

    /// User-triggered termination. No result, no retry.
    #[error("operation cancelled")]
    Cancelled,

    /// Scratch-file I/O failure outside the named categories above.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
