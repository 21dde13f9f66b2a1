// Integration tests for the end-to-end pipeline coordinator
//
// The recognizer is faked with a /bin/sh script. The full captured-audio
// path additionally needs ffmpeg/ffprobe and is skipped where those are
// not installed; everything else runs hermetically.

#![cfg(unix)]

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use vault_scribe::{
    archive_file_name, resolve_archive_dir, Config, InputHints, ModelSize, PipelineCoordinator,
    PipelineError, ProcessingRequest, RecordingSession, SourceAudio,
};

fn write_fake_recognizer(dir: &Path) -> Result<PathBuf> {
    let path = dir.join("fake-recognizer.sh");
    std::fs::write(
        &path,
        r#"
echo '[00:00.000 --> 00:02.000] hello'
echo '[00:02.000 --> 00:04.000] world'
name=$(basename "$1")
stem="${name%.*}"
printf 'hello world\n' > "$9/$stem.txt"
"#,
    )?;
    Ok(path)
}

// Directly-executed transcoder stand-in; unlike the recognizer fake it is
// not run through an interpreter, so it needs a shebang and the exec bit.
fn write_fake_ffmpeg(dir: &Path, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

fn test_config(scratch: &Path, script: PathBuf, base_dir: PathBuf) -> Config {
    let mut cfg = Config::default();
    cfg.recognizer.interpreter = PathBuf::from("/bin/sh");
    cfg.recognizer.script = script;
    cfg.transcription.scratch_dir = Some(scratch.to_path_buf());
    cfg.transcription.base_dir = base_dir;
    cfg
}

fn base_request(source: SourceAudio) -> ProcessingRequest {
    ProcessingRequest {
        source,
        language: "ja".to_string(),
        model_size: ModelSize::Base,
        archive_dir: PathBuf::from("04_assets/audio"),
        hints: InputHints::default(),
    }
}

fn ffmpeg_available() -> bool {
    let ffmpeg_ok = std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .is_ok();
    let ffprobe_ok = std::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .is_ok();
    ffmpeg_ok && ffprobe_ok
}

#[test]
fn test_archive_dir_resolution_relative_to_base() {
    let resolved = resolve_archive_dir(Path::new("04_assets/audio"), Path::new("/vault"));
    assert_eq!(resolved, PathBuf::from("/vault/04_assets/audio"));
}

#[test]
fn test_archive_dir_resolution_absolute_wins() {
    let resolved = resolve_archive_dir(Path::new("/elsewhere/audio"), Path::new("/vault"));
    assert_eq!(resolved, PathBuf::from("/elsewhere/audio"));
}

#[test]
fn test_archive_dir_resolution_expands_tilde() {
    let resolved = resolve_archive_dir(Path::new("~/recordings"), Path::new("/vault"));
    assert!(
        !resolved.to_string_lossy().contains('~'),
        "tilde should be expanded, got {:?}",
        resolved
    );
}

#[tokio::test]
async fn test_transcribe_existing_file_end_to_end() -> Result<()> {
    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    let script = write_fake_recognizer(scratch.path())?;
    let cfg = test_config(scratch.path(), script, vault.path().to_path_buf());

    let audio = scratch.path().join("memo.wav");
    std::fs::write(&audio, b"not really audio")?;

    let (coordinator, mut events) = PipelineCoordinator::new(cfg)?;
    let request = base_request(SourceAudio::File(audio.clone()));

    let transcript = coordinator.transcribe_existing_file(&audio, &request).await?;
    assert_eq!(transcript, "hello world");

    // Progress arrived in emission order
    let mut labels = Vec::new();
    while let Ok(event) = events.progress.try_recv() {
        labels.push(event.label);
    }
    assert_eq!(
        labels,
        vec![
            "Transcribing… 00:02".to_string(),
            "Transcribing… 00:04".to_string()
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_transcribe_existing_file_missing_artifact_is_not_silent() -> Result<()> {
    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    // Recognizer exits 0 but writes nothing
    let script = scratch.path().join("fake-recognizer.sh");
    std::fs::write(&script, "exit 0\n")?;
    let cfg = test_config(scratch.path(), script, vault.path().to_path_buf());

    let audio = scratch.path().join("memo.wav");
    std::fs::write(&audio, b"not really audio")?;

    let (coordinator, mut events) = PipelineCoordinator::new(cfg)?;
    let request = base_request(SourceAudio::File(audio.clone()));

    let err = coordinator
        .transcribe_existing_file(&audio, &request)
        .await
        .expect_err("no artifact must not yield an empty transcript");
    assert!(matches!(err, PipelineError::ResultArtifactMissing { .. }));

    // Failure surfaced as a single error event at the coordinator boundary
    let event = events.errors.try_recv().expect("one error event");
    assert!(event.message.contains("no output"));

    Ok(())
}

#[tokio::test]
async fn test_cancel_settles_as_cancelled_without_transcript() -> Result<()> {
    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    let script = scratch.path().join("fake-recognizer.sh");
    std::fs::write(&script, "exec sleep 30\n")?;
    let cfg = test_config(scratch.path(), script, vault.path().to_path_buf());

    let audio = scratch.path().join("memo.wav");
    std::fs::write(&audio, b"not really audio")?;

    let (coordinator, _events) = PipelineCoordinator::new(cfg)?;
    let coordinator = std::sync::Arc::new(coordinator);

    let request = base_request(SourceAudio::File(audio.clone()));
    let run = {
        let coordinator = std::sync::Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.transcribe_existing_file(&audio, &request).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    coordinator.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), run).await??;
    assert!(
        matches!(outcome, Err(PipelineError::Cancelled)),
        "expected Cancelled, got {:?}",
        outcome
    );

    Ok(())
}

#[tokio::test]
async fn test_failed_conversion_kills_sibling_conversion() -> Result<()> {
    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    // The archive encode (libmp3lame) fails immediately; the normalize
    // engine sleeps, then records that it survived.
    let marker = scratch.path().join("sibling-survived");
    let ffmpeg = write_fake_ffmpeg(
        scratch.path(),
        &format!(
            r#"case "$*" in
  *libmp3lame*) echo 'encoder exploded' 1>&2; exit 1 ;;
  *) sleep 2; touch "{}"; exit 0 ;;
esac"#,
            marker.display()
        ),
    )?;

    let script = write_fake_recognizer(scratch.path())?;
    let mut cfg = test_config(scratch.path(), script, vault.path().to_path_buf());
    cfg.recognizer.ffmpeg = ffmpeg.to_string_lossy().into_owned();

    let request = base_request(SourceAudio::Bytes {
        data: vec![0u8; 1024],
        extension: "pcm".to_string(),
    });

    let (coordinator, _events) = PipelineCoordinator::new(cfg)?;
    let err = coordinator
        .process_captured_audio(&request)
        .await
        .expect_err("failed conversion must fail the invocation");
    assert!(matches!(err, PipelineError::Transcode { .. }));

    // The surviving engine must die with the invocation, not run on
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(
        !marker.exists(),
        "sibling conversion outlived the settled invocation"
    );

    Ok(())
}

#[tokio::test]
async fn test_cancel_during_transcode_settles_as_cancelled() -> Result<()> {
    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    // Both conversions hang; exec keeps the tracked pid on the pipes
    let ffmpeg = write_fake_ffmpeg(scratch.path(), "exec sleep 30")?;
    let script = write_fake_recognizer(scratch.path())?;
    let mut cfg = test_config(scratch.path(), script, vault.path().to_path_buf());
    cfg.recognizer.ffmpeg = ffmpeg.to_string_lossy().into_owned();

    let (coordinator, _events) = PipelineCoordinator::new(cfg)?;
    let coordinator = std::sync::Arc::new(coordinator);

    let request = base_request(SourceAudio::Bytes {
        data: vec![0u8; 1024],
        extension: "pcm".to_string(),
    });
    let run = {
        let coordinator = std::sync::Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.process_captured_audio(&request).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    coordinator.cancel();

    // Settling within the timeout proves both conversions died: they are
    // joined before recognition and both were mid-run when cancel hit
    let outcome = tokio::time::timeout(Duration::from_secs(5), run).await??;
    assert!(
        matches!(outcome, Err(PipelineError::Cancelled)),
        "expected Cancelled, got {:?}",
        outcome
    );

    Ok(())
}

#[tokio::test]
async fn test_process_captured_audio_full_pipeline() -> Result<()> {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg/ffprobe not installed");
        return Ok(());
    }

    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    let script = write_fake_recognizer(scratch.path())?;
    let cfg = test_config(scratch.path(), script, vault.path().to_path_buf());

    // One second of raw silence; the hints tell the transcoder how to read it
    let session = RecordingSession::new(vec![0u8; 16000 * 2]);
    let request = ProcessingRequest {
        source: SourceAudio::from_session(session, "pcm"),
        language: "ja".to_string(),
        model_size: ModelSize::Base,
        archive_dir: PathBuf::from("04_assets/audio"),
        hints: InputHints {
            format: Some("s16le".to_string()),
            sample_rate: Some(16000),
            channels: Some(1),
        },
    };

    let (coordinator, _events) = PipelineCoordinator::new(cfg)?;
    let result = coordinator.process_captured_audio(&request).await?;

    assert_eq!(result.transcript, "hello world");
    let archive_bytes = result.archive_audio.expect("fresh capture yields archive bytes");
    assert!(!archive_bytes.is_empty());

    // Archive landed in <base>/04_assets/audio, created on demand
    let archive_dir = vault.path().join("04_assets/audio");
    assert!(archive_dir.is_dir());
    let archived: Vec<_> = std::fs::read_dir(&archive_dir)?.collect();
    assert_eq!(archived.len(), 1, "exactly one archived recording");

    // All scratch artifacts were cleaned up on success
    let leftovers: Vec<_> = std::fs::read_dir(scratch.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("capture-"))
        .collect();
    assert!(leftovers.is_empty(), "scratch artifacts should be gone: {:?}", leftovers);

    Ok(())
}

#[tokio::test]
async fn test_archive_write_failure_aborts_before_recognition() -> Result<()> {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg/ffprobe not installed");
        return Ok(());
    }

    let scratch = TempDir::new()?;
    let vault = TempDir::new()?;

    // A recognizer that records whether it was ever invoked
    let marker = scratch.path().join("recognizer-ran");
    let script = scratch.path().join("fake-recognizer.sh");
    std::fs::write(&script, format!("touch {}\nexit 0\n", marker.display()))?;
    let cfg = test_config(scratch.path(), script, vault.path().to_path_buf());

    // Archive "directory" is blocked by an existing file
    std::fs::write(vault.path().join("04_assets"), b"in the way")?;

    let pcm = vec![0u8; 16000 * 2];
    let request = ProcessingRequest {
        source: SourceAudio::Bytes {
            data: pcm,
            extension: "pcm".to_string(),
        },
        language: "ja".to_string(),
        model_size: ModelSize::Base,
        archive_dir: PathBuf::from("04_assets/audio"),
        hints: InputHints {
            format: Some("s16le".to_string()),
            sample_rate: Some(16000),
            channels: Some(1),
        },
    };

    let (coordinator, _events) = PipelineCoordinator::new(cfg)?;
    let err = coordinator
        .process_captured_audio(&request)
        .await
        .expect_err("blocked archive dir must fail");

    assert!(matches!(err, PipelineError::ArchiveWrite { .. }));
    assert!(!marker.exists(), "recognition must not be attempted");

    Ok(())
}

#[test]
fn test_archive_file_names_unique_within_one_second() {
    let now = chrono::Utc::now();
    let first = archive_file_name(now);
    let second = archive_file_name(now);

    assert_ne!(first, second, "same-second captures must not collide");
    assert!(first.starts_with("recording-") && first.ends_with(".mp3"));
    assert!(first.contains(&now.format("%Y%m%d-%H%M%S").to_string()));
}

#[test]
fn test_model_size_parsing() {
    assert_eq!("small".parse::<ModelSize>(), Ok(ModelSize::Small));
    assert_eq!("LARGE".parse::<ModelSize>(), Ok(ModelSize::Large));
    assert_eq!(ModelSize::Medium.as_str(), "medium");
    assert!("huge".parse::<ModelSize>().is_err());
}
