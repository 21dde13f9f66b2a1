use crate::pipeline::{PipelineError, PipelineResult, ProgressEvent};
use crate::process::{ProcessRole, ProcessSupervisor};
use crate::progress::{for_each_line, parse_clock, parse_percent, ProgressTracker};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Explicit input container/codec hints for the engine.
///
/// Captured raw PCM has no self-describing container, so the demuxer,
/// sample rate and channel count have to be stated up front. For regular
/// container files all fields stay `None` and the engine probes the input.
#[derive(Debug, Clone, Default)]
pub struct InputHints {
    /// Demuxer/container name (e.g. "webm", "s16le")
    pub format: Option<String>,
    /// Input sample rate, for raw PCM
    pub sample_rate: Option<u32>,
    /// Input channel count, for raw PCM
    pub channels: Option<u16>,
}

/// The two conversion targets run against every captured recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeTarget {
    /// Compressed MP3 for long-term storage, fixed bitrate, source channels
    Archive,
    /// Mono 16kHz PCM WAV, the recognizer's required input format
    Normalized,
}

impl TranscodeTarget {
    pub fn extension(self) -> &'static str {
        match self {
            TranscodeTarget::Archive => "mp3",
            TranscodeTarget::Normalized => "wav",
        }
    }

    fn role(self) -> ProcessRole {
        match self {
            TranscodeTarget::Archive => ProcessRole::ArchiveEncode,
            TranscodeTarget::Normalized => ProcessRole::Normalize,
        }
    }

    fn progress_label(self) -> &'static str {
        match self {
            TranscodeTarget::Archive => "Archiving audio",
            TranscodeTarget::Normalized => "Preparing audio for recognition",
        }
    }

    fn codec_args(self) -> &'static [&'static str] {
        match self {
            TranscodeTarget::Archive => &["-codec:a", "libmp3lame", "-b:a", "128k"],
            TranscodeTarget::Normalized => &["-codec:a", "pcm_s16le", "-ar", "16000", "-ac", "1"],
        }
    }
}

/// Build the full engine argument list for one conversion.
pub fn transcode_args(
    input: &Path,
    output: &Path,
    target: TranscodeTarget,
    hints: &InputHints,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
    ];

    // Input hints must precede -i
    if let Some(format) = &hints.format {
        args.push("-f".into());
        args.push(format.clone());
    }
    if let Some(rate) = hints.sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string());
    }
    if let Some(channels) = hints.channels {
        args.push("-ac".into());
        args.push(channels.to_string());
    }

    args.push("-i".into());
    args.push(input.to_string_lossy().into_owned());

    for flag in target.codec_args() {
        args.push((*flag).to_string());
    }

    args.push("-y".into());
    args.push(output.to_string_lossy().into_owned());

    args
}

/// Probe the duration of an input file in seconds.
///
/// Runs concurrently with engine spawn so it never blocks startup; failure
/// only means progress stays indeterminate, so it is logged, not surfaced.
pub async fn probe_duration(ffprobe: &str, input: &Path) -> Option<f64> {
    let output = tokio::process::Command::new(ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(input)
        .output()
        .await;

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            warn!(
                "Duration probe exited non-zero for {}: {}",
                input.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        Err(e) => {
            warn!("Failed to run duration probe: {}", e);
            return None;
        }
    };

    let parsed: serde_json::Value = match serde_json::from_slice(&output.stdout) {
        Ok(value) => value,
        Err(e) => {
            warn!("Unparseable duration probe output: {}", e);
            return None;
        }
    };

    let duration = parsed["format"]["duration"]
        .as_str()
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|d| *d > 0.0);

    if let Some(duration) = duration {
        debug!("Probed duration of {}: {:.3}s", input.display(), duration);
    }

    duration
}

/// Invokes the external transcoding engine and reports percent-complete.
pub struct Transcoder {
    ffmpeg: String,
    supervisor: Arc<ProcessSupervisor>,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl Transcoder {
    pub fn new(
        ffmpeg: impl Into<String>,
        supervisor: Arc<ProcessSupervisor>,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            supervisor,
            progress_tx,
        }
    }

    /// Run one conversion to completion.
    ///
    /// `total` is the shared duration-probe result; percent is reported as
    /// soon as it resolves. Fails with `Transcode` on non-zero exit or a
    /// missing output file, and with `Cancelled` when the supervisor
    /// terminated the engine.
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: TranscodeTarget,
        hints: &InputHints,
        total: watch::Receiver<Option<f64>>,
    ) -> PipelineResult<()> {
        let role = target.role();
        let args = transcode_args(input, output, target, hints);

        info!(
            "Starting {} conversion: {} -> {}",
            role.label(),
            input.display(),
            output.display()
        );

        let mut child = self
            .supervisor
            .launch(role, &self.ffmpeg, &args, &[])
            .map_err(|e| spawn_error("ffmpeg", &self.ffmpeg, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Percent extraction from the engine's progress stream
        let progress_fut = async {
            let Some(stdout) = stdout else { return };
            let mut tracker = ProgressTracker::new();
            let mut last_reported: Option<u8> = None;

            let consumed = for_each_line(stdout, |line| {
                if tracker.total().is_none() {
                    if let Some(duration) = *total.borrow() {
                        tracker.set_total(duration);
                    }
                }

                let percent = if let Some(direct) = parse_percent(line) {
                    Some(direct)
                } else if let Some(elapsed) = parse_progress_record(line) {
                    if tracker.advance(elapsed) {
                        tracker.percent()
                    } else {
                        None
                    }
                } else {
                    None
                };

                if let Some(percent) = percent {
                    if last_reported != Some(percent) {
                        last_reported = Some(percent);
                        let _ = self.progress_tx.send(ProgressEvent::new(format!(
                            "{}… {}%",
                            target.progress_label(),
                            percent
                        )));
                    }
                }
            })
            .await;

            if let Err(e) = consumed {
                warn!("Error reading {} progress stream: {}", role.label(), e);
            }
        };

        // Drain stderr so the engine can never block on a full pipe; keep
        // it for the failure message.
        let stderr_fut = async {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut text).await {
                    warn!("Error reading {} stderr: {}", role.label(), e);
                }
            }
            text
        };

        let ((), stderr_text) = tokio::join!(progress_fut, stderr_fut);

        let status = child.wait().await?;
        self.supervisor.release(role);

        if self.supervisor.is_cancelled() {
            info!("{} conversion cancelled", role.label());
            return Err(PipelineError::Cancelled);
        }

        if !status.success() {
            let detail = stderr_text.trim();
            let message = if detail.is_empty() {
                format!("engine exited with {}", status)
            } else {
                detail.to_string()
            };
            return Err(PipelineError::Transcode { message });
        }

        if tokio::fs::metadata(output).await.is_err() {
            return Err(PipelineError::Transcode {
                message: format!(
                    "engine reported success but {} was not produced",
                    output.display()
                ),
            });
        }

        info!("{} conversion complete: {}", role.label(), output.display());
        Ok(())
    }
}

/// Pull an elapsed position out of one `key=value` progress record
/// (`out_time=00:00:04.200000`).
fn parse_progress_record(line: &str) -> Option<f64> {
    let (key, value) = line.split_once('=')?;
    match key.trim() {
        "out_time" => parse_clock(value),
        "out_time_us" => value.trim().parse::<f64>().ok().map(|us| us / 1_000_000.0),
        _ => None,
    }
}

/// A spawn failure with NotFound means the engine binary is absent, which
/// is a missing dependency, not a stage failure.
pub(crate) fn spawn_error(name: &str, program: impl Into<PathBuf>, err: io::Error) -> PipelineError {
    if err.kind() == io::ErrorKind::NotFound {
        PipelineError::DependencyMissing {
            name: name.to_string(),
            path: program.into(),
        }
    } else {
        PipelineError::Io(err)
    }
}
