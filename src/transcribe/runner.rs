use crate::pipeline::{ErrorEvent, ModelSize, PipelineError, PipelineResult, ProgressEvent};
use crate::process::{ProcessRole, ProcessSupervisor};
use crate::progress::{for_each_line, format_clock, parse_timestamp_range, ProgressTracker};
use crate::transcode::probe_duration;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Build the recognizer command line (everything after the interpreter).
pub fn recognizer_args(
    script: &Path,
    audio: &Path,
    model: ModelSize,
    language: &str,
    output_dir: &Path,
) -> Vec<String> {
    vec![
        script.to_string_lossy().into_owned(),
        audio.to_string_lossy().into_owned(),
        "--model".into(),
        model.as_str().into(),
        "--language".into(),
        language.into(),
        "--output-format".into(),
        "txt".into(),
        "--output-dir".into(),
        output_dir.to_string_lossy().into_owned(),
        "--condition-on-previous-text".into(),
        "False".into(),
    ]
}

/// Extract a presentable failure message from accumulated engine output:
/// everything from an `Error:` marker onward when one exists, else the raw
/// output.
pub fn extract_failure_message(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return "recognizer produced no diagnostic output".to_string();
    }
    match trimmed.find("Error:") {
        Some(marker) => trimmed[marker..].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Invokes the external recognizer and reconstructs the transcript.
pub struct TranscriptionRunner {
    interpreter: PathBuf,
    script: PathBuf,
    ffprobe: String,
    supervisor: Arc<ProcessSupervisor>,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    error_tx: mpsc::UnboundedSender<ErrorEvent>,
}

impl TranscriptionRunner {
    pub fn new(
        interpreter: PathBuf,
        script: PathBuf,
        ffprobe: impl Into<String>,
        supervisor: Arc<ProcessSupervisor>,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        error_tx: mpsc::UnboundedSender<ErrorEvent>,
    ) -> Self {
        Self {
            interpreter,
            script,
            ffprobe: ffprobe.into(),
            supervisor,
            progress_tx,
            error_tx,
        }
    }

    /// Run the recognizer on `audio` and return the trimmed transcript.
    ///
    /// The result artifact `<basename>.txt` in `scratch_dir` is the source
    /// of truth; stdout accumulation only feeds progress and failure
    /// messages. Terminal states: transcript, a taxonomy error, or
    /// `Cancelled` when the supervisor killed the process.
    pub async fn run(
        &self,
        audio: &Path,
        scratch_dir: &Path,
        language: &str,
        model: ModelSize,
    ) -> PipelineResult<String> {
        // Fail fast, before any process exists
        for (name, path) in [
            ("interpreter", &self.interpreter),
            ("recognizer", &self.script),
        ] {
            if !path.exists() {
                return Err(PipelineError::DependencyMissing {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }

        // Duration probe runs alongside the spawn; progress is
        // indeterminate until it resolves.
        let (total_tx, total_rx) = watch::channel(None);
        {
            let ffprobe = self.ffprobe.clone();
            let audio = audio.to_path_buf();
            tokio::spawn(async move {
                let duration = probe_duration(&ffprobe, &audio).await;
                let _ = total_tx.send(duration);
            });
        }

        let args = recognizer_args(&self.script, audio, model, language, scratch_dir);
        info!(
            "Starting recognizer: {} {} (model={}, language={})",
            self.interpreter.display(),
            self.script.display(),
            model,
            language
        );

        // Unbuffered interpreter output so segment lines stream as they
        // are produced rather than on process exit.
        let envs = [("PYTHONUNBUFFERED".to_string(), "1".to_string())];

        let mut child = self
            .supervisor
            .launch(ProcessRole::Recognize, &self.interpreter, &args, &envs)
            .map_err(|e| crate::transcode::spawn_error("interpreter", &self.interpreter, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Segment lines: accumulate and extract progress
        let progress_tx = self.progress_tx.clone();
        let stdout_fut = async move {
            let mut accumulated = String::new();
            let Some(stdout) = stdout else {
                return accumulated;
            };

            let mut tracker = ProgressTracker::new();
            let consumed = for_each_line(stdout, |line| {
                accumulated.push_str(line);
                accumulated.push('\n');

                if tracker.total().is_none() {
                    if let Some(duration) = *total_rx.borrow() {
                        tracker.set_total(duration);
                    }
                }

                let Some((_start, end)) = parse_timestamp_range(line) else {
                    return; // not progress, just transcript text
                };
                if !tracker.advance(end) {
                    return;
                }

                let label = match (tracker.percent(), tracker.total()) {
                    (Some(percent), Some(total)) => format!(
                        "Transcribing… {}% ({} / {})",
                        percent,
                        format_clock(end),
                        format_clock(total)
                    ),
                    _ => format!("Transcribing… {}", format_clock(end)),
                };
                let _ = progress_tx.send(ProgressEvent::new(label));
            })
            .await;

            if let Err(e) = consumed {
                warn!("Error reading recognizer stdout: {}", e);
            }
            accumulated
        };

        // Diagnostics: surface error-marked lines as they occur; they do
        // not terminate the run, only process exit does.
        let error_tx = self.error_tx.clone();
        let stderr_fut = async move {
            let mut accumulated = String::new();
            let Some(stderr) = stderr else {
                return accumulated;
            };

            let consumed = for_each_line(stderr, |line| {
                accumulated.push_str(line);
                accumulated.push('\n');

                if line.contains("Error") || line.contains("Traceback") {
                    warn!("Recognizer diagnostic: {}", line);
                    let _ = error_tx.send(ErrorEvent::new(line));
                }
            })
            .await;

            if let Err(e) = consumed {
                warn!("Error reading recognizer stderr: {}", e);
            }
            accumulated
        };

        let (stdout_acc, stderr_acc) = tokio::join!(stdout_fut, stderr_fut);

        let status = child.wait().await?;
        self.supervisor.release(ProcessRole::Recognize);

        if self.supervisor.is_cancelled() {
            info!("Recognition cancelled");
            return Err(PipelineError::Cancelled);
        }

        if !status.success() {
            let mut combined = stdout_acc;
            combined.push_str(&stderr_acc);
            return Err(PipelineError::RecognitionFailed {
                message: extract_failure_message(&combined),
            });
        }

        // Exit 0 means the artifact must exist; its contents supersede
        // anything accumulated from stdout.
        let artifact = result_artifact_path(audio, scratch_dir);
        match tokio::fs::read_to_string(&artifact).await {
            Ok(text) => {
                debug!("Read result artifact {}", artifact.display());
                if let Err(e) = tokio::fs::remove_file(&artifact).await {
                    warn!("Failed to remove result artifact: {}", e);
                }
                Ok(text.trim().to_string())
            }
            Err(_) => Err(PipelineError::ResultArtifactMissing { path: artifact }),
        }
    }
}

/// The recognizer names its output after the input's base name.
fn result_artifact_path(audio: &Path, scratch_dir: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string());
    scratch_dir.join(format!("{}.txt", stem))
}
