#![cfg(unix)]

use ::domain::DownloadOutcome;
use ::domain::DownloadRequest;
use ::domain::PlaylistPosition;
use ::domain::PlaylistSummary;
use ::domain::Quality;
use ::domain::Resolution;
use ::domain::Scope;
use ::futures::prelude::*;
use ::infrastructures::gateways::downloaders::YtdlpDownloader;
use ::use_cases::gateways::Downloader;
use ::use_cases::gateways::FormatLister;
use ::use_cases::gateways::PlaylistInspector;
use ::use_cases::gateways::VersionSource;
use ::use_cases::models::errors::DownloadError;
use ::use_cases::models::events::DiagnosticEvent;
use ::use_cases::models::events::DiagnosticLevel;
use ::use_cases::models::events::DownloadEvent;

/// Writes an executable shell script standing in for yt-dlp.
fn fake_tool(directory: &::tempfile::TempDir, body: &str) -> ::std::path::PathBuf {
    use ::std::os::unix::fs::PermissionsExt as _;

    let path = directory.path().join("yt-dlp");

    ::std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    ::std::fs::set_permissions(&path, ::std::fs::Permissions::from_mode(0o755)).unwrap();

    path
}

fn downloader(program: ::std::path::PathBuf) -> ::std::sync::Arc<YtdlpDownloader> {
    ::std::sync::Arc::new(YtdlpDownloader::builder().program(program).build())
}

fn request(directory: &::tempfile::TempDir) -> DownloadRequest {
    DownloadRequest {
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
        scope: Scope::Video,
        quality: Quality::Best,
        filename: None,
        directory: directory.path().to_path_buf().into(),
        subtitles: false,
        subtitle_language: "en".into(),
        embed_metadata: false,
        embed_thumbnail: false,
    }
}

async fn drain(
    handle: ::use_cases::gateways::DownloadHandle,
) -> (Vec<DownloadEvent>, Vec<DiagnosticEvent>) {
    let events = handle.events.collect::<Vec<_>>();
    let diagnostics = handle.diagnostics.collect::<Vec<_>>();

    ::tokio::time::timeout(::std::time::Duration::from_secs(10), async { ::tokio::join!(events, diagnostics) })
        .await
        .unwrap()
}

#[tokio::test]
async fn format_listing_is_parsed_and_deduplicated() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"
echo "[info] Available formats for dQw4w9WgXcQ:"
echo "ID  EXT   RESOLUTION FPS"
echo "140 m4a audio only"
echo "22 mp4 1280x720"
echo "22 mp4 1280x720"
"#);

    let formats = downloader(program).list("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()).await.unwrap();

    assert_eq!(formats.len(), 2);
    assert_eq!(formats[0].resolution, Resolution::AudioOnly);
    assert_eq!(formats[1].id, "22");
}

#[tokio::test]
async fn failing_listing_is_a_tool_invocation_error() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"echo "ERROR: Unsupported URL" >&2; exit 1"#);

    let err = downloader(program).list("https://www.youtube.com/watch?v=x".into()).await.unwrap_err();

    assert_eq!(
        err.downcast_ref::<DownloadError>(),
        Some(&DownloadError::ToolInvocation("ERROR: Unsupported URL".into())),
    );
}

#[tokio::test]
async fn missing_program_is_a_tool_invocation_error() {
    let directory = ::tempfile::tempdir().unwrap();
    let downloader = downloader(directory.path().join("does-not-exist"));

    let err = ::std::sync::Arc::clone(&downloader)
        .list("https://www.youtube.com/watch?v=x".into())
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<DownloadError>(), Some(DownloadError::ToolInvocation(_))));

    let err = match downloader
        .download(request(&directory), ::tokio_util::sync::CancellationToken::new())
        .await
    {
        Ok(_) => panic!("spawning a missing program succeeded"),
        Err(err) => err,
    };
    assert!(matches!(err.downcast_ref::<DownloadError>(), Some(DownloadError::ToolInvocation(_))));
}

#[tokio::test]
async fn completed_run_streams_progress_with_position() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"
echo "[youtube:tab] Downloading playlist PL123"
echo "[download] Downloading item 1 of 2"
echo "[download]  45.2% of ~  10.00MiB at    1.00MiB/s ETA 00:10"
echo "WARNING: [youtube] Falling back to generic n function search" >&2
"#);

    let handle = downloader(program)
        .download(request(&directory), ::tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    let (events, diagnostics) = drain(handle).await;

    let progress = events
        .iter()
        .find_map(|event| match event {
            DownloadEvent::ProgressUpdated(progress) => Some(progress.clone()),
            _ => None,
        })
        .unwrap();

    assert_eq!(progress.percentage, 45.2);
    assert_eq!(progress.eta.as_deref(), Some("00:10"));
    assert_eq!(progress.position, Some(PlaylistPosition { index: 1, total: 2 }));

    assert_eq!(events.last(), Some(&DownloadEvent::Finished(DownloadOutcome::Completed)));
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].level, DiagnosticLevel::Warning);
}

#[tokio::test]
async fn arguments_reach_the_tool() {
    let directory = ::tempfile::tempdir().unwrap();
    let capture = directory.path().join("args.txt");
    let program = fake_tool(&directory, &format!(r#"printf '%s\n' "$@" > '{}'"#, capture.display()));

    let mut request = request(&directory);
    request.subtitles = true;
    request.filename = Some("clip".into());

    let handle = downloader(program)
        .download(request, ::tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    drain(handle).await;

    let args = ::std::fs::read_to_string(&capture).unwrap();
    let args = args.lines().collect::<Vec<_>>();

    assert!(args.contains(&"--write-auto-sub"));
    assert!(args.contains(&"--no-playlist"));
    assert!(args.contains(&&*directory.path().join("clip.%(ext)s").to_string_lossy()));
    assert_eq!(args.last(), Some(&"https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
}

#[derive(Clone, Default)]
struct SharedLog(::std::sync::Arc<::std::sync::Mutex<Vec<u8>>>);

impl ::std::io::Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> ::std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> ::std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn tool_output_is_written_to_the_log() {
    let log = SharedLog::default();
    let subscriber = ::tracing_subscriber::fmt()
        .with_max_level(::tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer({
            let log = log.clone();
            move || log.clone()
        })
        .finish();
    let _guard = ::tracing::subscriber::set_default(subscriber);

    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"
echo "[youtube] dQw4w9WgXcQ: Downloading webpage"
echo "[Merger] Merging formats into clip.mkv"
"#);

    let handle = downloader(program)
        .download(request(&directory), ::tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    drain(handle).await;

    let log = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();

    assert!(log.contains("[youtube] dQw4w9WgXcQ: Downloading webpage"));
    assert!(log.contains("[Merger] Merging formats into clip.mkv"));
}

#[tokio::test]
async fn failed_run_carries_stderr() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"echo "ERROR: [youtube] x: Video unavailable" >&2; exit 1"#);

    let handle = downloader(program)
        .download(request(&directory), ::tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    let (events, diagnostics) = drain(handle).await;

    assert_eq!(
        events.last(),
        Some(&DownloadEvent::Finished(DownloadOutcome::Failed("ERROR: [youtube] x: Video unavailable".into()))),
    );
    assert_eq!(diagnostics[0].level, DiagnosticLevel::Error);
}

#[tokio::test]
async fn silent_failure_reports_exit_status() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, "exit 3");

    let handle = downloader(program)
        .download(request(&directory), ::tokio_util::sync::CancellationToken::new())
        .await
        .unwrap();
    let (events, _) = drain(handle).await;

    match events.last() {
        Some(DownloadEvent::Finished(DownloadOutcome::Failed(message))) => assert!(message.contains("exit")),
        other => panic!("unexpected final event: {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_terminates_a_running_download() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"
echo "[download]   5.0% of 10.00MiB at 1.00MiB/s ETA 00:09"
exec sleep 30
"#);

    let cancellation = ::tokio_util::sync::CancellationToken::new();
    let handle = downloader(program).download(request(&directory), cancellation.clone()).await.unwrap();

    let mut events = handle.events;

    let first = ::tokio::time::timeout(::std::time::Duration::from_secs(10), events.next())
        .await
        .unwrap();
    assert!(matches!(first, Some(DownloadEvent::ProgressUpdated(_))));

    cancellation.cancel();

    let rest = ::tokio::time::timeout(::std::time::Duration::from_secs(10), events.collect::<Vec<_>>())
        .await
        .unwrap();

    assert_eq!(rest, vec![DownloadEvent::Finished(DownloadOutcome::Cancelled)]);
}

#[tokio::test]
async fn cancelled_before_output_reports_cancelled_even_on_clean_exit() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, "exit 0");

    let cancellation = ::tokio_util::sync::CancellationToken::new();
    cancellation.cancel();

    let handle = downloader(program).download(request(&directory), cancellation).await.unwrap();

    let (events, _) = drain(handle).await;

    assert_eq!(events, vec![DownloadEvent::Finished(DownloadOutcome::Cancelled)]);
}

#[tokio::test]
async fn version_is_first_line_of_output() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"echo "2024.08.06""#);

    assert_eq!(downloader(program).version().await.unwrap(), "2024.08.06");
}

#[tokio::test]
async fn playlist_summary_comes_from_flat_json() {
    let directory = ::tempfile::tempdir().unwrap();
    let program = fake_tool(&directory, r#"
echo '{"id": "a", "playlist_title": "Lectures"}'
echo '{"id": "b", "playlist_title": "Lectures"}'
echo '{"id": "c", "playlist_title": "Lectures"}'
"#);

    let summary = downloader(program)
        .inspect("https://www.youtube.com/playlist?list=PL123".into())
        .await
        .unwrap();

    assert_eq!(summary, PlaylistSummary { title: Some("Lectures".into()), entries: 3 });
}
