use super::error::{PipelineError, PipelineResult};
use super::event::{ErrorEvent, ProgressEvent};
use super::request::{ProcessingRequest, ProcessingResult, SourceAudio};
use crate::config::Config;
use crate::process::{ProcessRole, ProcessSupervisor};
use crate::transcode::{probe_duration, TranscodeTarget, Transcoder};
use crate::transcribe::TranscriptionRunner;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Receivers for the coordinator's advisory event streams.
///
/// Events arrive in emission order; a consumer that falls behind or drops
/// a receiver loses nothing but display updates.
pub struct PipelineEvents {
    pub progress: mpsc::UnboundedReceiver<ProgressEvent>,
    pub errors: mpsc::UnboundedReceiver<ErrorEvent>,
}

/// Resolve the caller-specified archive directory: `~` expanded, relative
/// paths anchored at the configured base directory.
pub fn resolve_archive_dir(archive_dir: &Path, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&archive_dir.to_string_lossy().into_owned()).into_owned();
    let path = PathBuf::from(expanded);

    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Archive file name for a capture: a timestamp for humans plus a uuid so
/// that captures archived within the same second never overwrite each
/// other.
pub fn archive_file_name(captured_at: DateTime<Utc>) -> String {
    format!(
        "recording-{}-{}.mp3",
        captured_at.format("%Y%m%d-%H%M%S"),
        Uuid::new_v4()
    )
}

/// The three scratch files one captured-audio invocation materializes.
struct ScratchSet {
    raw: PathBuf,
    archive: PathBuf,
    normalized: PathBuf,
}

impl ScratchSet {
    fn paths(&self) -> [&Path; 3] {
        [&self.raw, &self.archive, &self.normalized]
    }
}

/// Sequences transcode, archive copy and recognition into one end-to-end
/// operation. The only component host-facing layers call.
///
/// One invocation may be in flight at a time per coordinator; submitting a
/// second while one is active is a caller error.
pub struct PipelineCoordinator {
    config: Config,
    supervisor: Arc<ProcessSupervisor>,
    scratch_dir: PathBuf,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    error_tx: mpsc::UnboundedSender<ErrorEvent>,
}

impl PipelineCoordinator {
    /// Build a coordinator and the event receivers that go with it.
    pub fn new(config: Config) -> Result<(Self, PipelineEvents)> {
        let scratch_dir = config
            .transcription
            .scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("vault-scribe"));

        std::fs::create_dir_all(&scratch_dir)
            .with_context(|| format!("Failed to create scratch directory {:?}", scratch_dir))?;

        info!("Pipeline scratch directory: {}", scratch_dir.display());

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            config,
            supervisor: Arc::new(ProcessSupervisor::new()),
            scratch_dir,
            progress_tx,
            error_tx,
        };
        let events = PipelineEvents {
            progress: progress_rx,
            errors: error_rx,
        };

        Ok((coordinator, events))
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Terminate whatever is currently running. Safe to call at any time.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.supervisor.cancel_all();
    }

    /// Full treatment of a fresh capture: persist to scratch, convert to
    /// archive and recognizer formats in parallel, copy the archive into
    /// the caller's archive directory, transcribe, clean up.
    pub async fn process_captured_audio(
        &self,
        request: &ProcessingRequest,
    ) -> PipelineResult<ProcessingResult> {
        self.supervisor.arm();

        let result = self.run_capture_stages(request).await;
        if let Err(err) = &result {
            self.report_terminal(err);
        }
        result
    }

    /// Transcribe a file already on disk. No transcoding, no archiving;
    /// the recognizer's own input tolerance applies.
    pub async fn transcribe_existing_file(
        &self,
        path: &Path,
        request: &ProcessingRequest,
    ) -> PipelineResult<String> {
        self.supervisor.arm();

        info!("Transcribing existing file: {}", path.display());
        let result = self
            .runner()
            .run(path, &self.scratch_dir, &request.language, request.model_size)
            .await;

        if let Err(err) = &result {
            self.report_terminal(err);
        }
        result
    }

    async fn run_capture_stages(
        &self,
        request: &ProcessingRequest,
    ) -> PipelineResult<ProcessingResult> {
        let scratch = self.materialize_scratch_names(&request.source);
        let outcome = self.capture_stages_inner(request, &scratch).await;

        match &outcome {
            // Abandoned deliberately: killed engines may still hold the
            // files, and the user asked us to stop touching their data.
            Err(PipelineError::Cancelled) => {
                warn!(
                    "Cancelled: leaving scratch files under {} for manual cleanup",
                    self.scratch_dir.display()
                );
            }
            _ => self.cleanup_scratch(&scratch).await,
        }

        outcome
    }

    async fn capture_stages_inner(
        &self,
        request: &ProcessingRequest,
        scratch: &ScratchSet,
    ) -> PipelineResult<ProcessingResult> {
        // Stage 0: materialize the input in the scratch directory
        match &request.source {
            SourceAudio::Bytes { data, .. } => {
                tokio::fs::write(&scratch.raw, data).await?;
                info!(
                    "Persisted {} captured bytes to {}",
                    data.len(),
                    scratch.raw.display()
                );
            }
            SourceAudio::File(path) => {
                tokio::fs::copy(path, &scratch.raw).await?;
                info!("Copied {} into scratch", path.display());
            }
        }

        // Stage 1: both conversions in parallel, joined before recognition.
        // The duration probe runs alongside so neither spawn waits on it.
        let transcoder = self.transcoder();
        let (total_tx, total_rx) = watch::channel(None);
        {
            let ffprobe = self.config.recognizer.ffprobe.clone();
            let input = scratch.raw.clone();
            tokio::spawn(async move {
                let duration = probe_duration(&ffprobe, &input).await;
                let _ = total_tx.send(duration);
            });
        }

        let archive_job = transcoder.convert(
            &scratch.raw,
            &scratch.archive,
            TranscodeTarget::Archive,
            &request.hints,
            total_rx.clone(),
        );
        let normalize_job = transcoder.convert(
            &scratch.raw,
            &scratch.normalized,
            TranscodeTarget::Normalized,
            &request.hints,
            total_rx,
        );
        if let Err(err) = futures::future::try_join(archive_job, normalize_job).await {
            // The first conversion error drops the sibling future mid-run;
            // its process dies with the dropped Child, but the registry
            // entry has to be cleared here since no one waits on it.
            self.supervisor.release(ProcessRole::ArchiveEncode);
            self.supervisor.release(ProcessRole::Normalize);
            return Err(err);
        }

        // Stage 2: archive copy, before recognition is attempted
        let archive_file = self.copy_to_archive(&scratch.archive, &request.archive_dir).await?;
        info!("Archived recording at {}", archive_file.display());

        if self.supervisor.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // Stage 3: recognition on the normalized file
        let transcript = self
            .runner()
            .run(
                &scratch.normalized,
                &self.scratch_dir,
                &request.language,
                request.model_size,
            )
            .await?;

        // Stage 4: hand the archive bytes back to the caller
        let archive_audio = tokio::fs::read(&scratch.archive).await?;

        self.emit_progress("Done");
        Ok(ProcessingResult {
            transcript,
            archive_audio: Some(archive_audio),
        })
    }

    /// Create (if needed) the archive directory and copy the compressed
    /// recording into it. Any failure here is an `ArchiveWrite` error and
    /// aborts the pipeline before recognition.
    async fn copy_to_archive(
        &self,
        archive_scratch: &Path,
        archive_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let resolved = resolve_archive_dir(archive_dir, &self.config.transcription.base_dir);

        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(|source| PipelineError::ArchiveWrite {
                dir: resolved.clone(),
                source,
            })?;

        let destination = resolved.join(archive_file_name(Utc::now()));

        tokio::fs::copy(archive_scratch, &destination)
            .await
            .map_err(|source| PipelineError::ArchiveWrite {
                dir: resolved,
                source,
            })?;

        Ok(destination)
    }

    fn materialize_scratch_names(&self, source: &SourceAudio) -> ScratchSet {
        // The raw file keeps its source extension so the transcoder can
        // identify the container when no explicit format hint is given.
        let raw_extension = match source {
            SourceAudio::Bytes { extension, .. } => extension.clone(),
            SourceAudio::File(path) => path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "bin".to_string()),
        };

        let stem = format!("capture-{}", Uuid::new_v4());
        ScratchSet {
            raw: self.scratch_dir.join(format!("{}.{}", stem, raw_extension)),
            archive: self
                .scratch_dir
                .join(format!("{}.{}", stem, TranscodeTarget::Archive.extension())),
            normalized: self
                .scratch_dir
                .join(format!("{}.{}", stem, TranscodeTarget::Normalized.extension())),
        }
    }

    /// Best-effort deletion of the scratch artifacts; failures are logged,
    /// never escalated into the operation's result.
    async fn cleanup_scratch(&self, scratch: &ScratchSet) {
        for path in scratch.paths() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }

    fn transcoder(&self) -> Transcoder {
        Transcoder::new(
            self.config.recognizer.ffmpeg.clone(),
            Arc::clone(&self.supervisor),
            self.progress_tx.clone(),
        )
    }

    fn runner(&self) -> TranscriptionRunner {
        TranscriptionRunner::new(
            self.config.recognizer.interpreter.clone(),
            self.config.recognizer.script.clone(),
            self.config.recognizer.ffprobe.clone(),
            Arc::clone(&self.supervisor),
            self.progress_tx.clone(),
            self.error_tx.clone(),
        )
    }

    /// Single boundary for terminal-state reporting: failures become one
    /// error event, cancellation a neutral progress notice.
    fn report_terminal(&self, err: &PipelineError) {
        match err {
            PipelineError::Cancelled => {
                info!("Pipeline settled as cancelled");
                self.emit_progress("Cancelled");
            }
            other => {
                error!("Pipeline failed: {}", other);
                let _ = self.error_tx.send(ErrorEvent::new(other.to_string()));
            }
        }
    }

    fn emit_progress(&self, label: &str) {
        let _ = self.progress_tx.send(ProgressEvent::new(label));
    }
}
