use ::async_trait::async_trait;
use ::domain::DownloadOutcome;
use ::domain::DownloadRequest;
use ::domain::FormatEntry;
use ::domain::PlaylistSummary;
use ::domain::Quality;
use ::domain::Resolution;
use ::domain::Scope;
use ::use_cases::gateways::DownloadHandle;
use ::use_cases::gateways::Downloader;
use ::use_cases::gateways::FormatLister;
use ::use_cases::gateways::PlaylistInspector;
use ::use_cases::gateways::VersionSource;
use ::use_cases::models::errors::DownloadError;
use ::use_cases::models::events::DiagnosticEvent;
use ::use_cases::models::events::DownloadEvent;
use ::futures::prelude::*;

use crate::gateways::parsers::parse_format_listing;
use crate::gateways::parsers::parse_playlist_summary;
use crate::gateways::parsers::FromYtdlpLine;
use crate::gateways::parsers::ProgressParser;
use crate::utils::aliases::BoxedStream;
use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedPath;
use crate::utils::aliases::MaybeOwnedString;
use crate::utils::extensions::OptionExt;

/// Drives the `yt-dlp` executable. One instance serves every gateway the
/// use cases need from the tool.
#[derive(::bon::Builder)]
#[builder(on(_, into))]
pub struct YtdlpDownloader {
    #[builder(default = ::std::borrow::Cow::Borrowed(::std::path::Path::new("yt-dlp")))]
    program: MaybeOwnedPath,
}

#[async_trait]
impl FormatLister for YtdlpDownloader {
    async fn list(self: ::std::sync::Arc<Self>, url: MaybeOwnedString) -> Fallible<Vec<FormatEntry>> {
        let stdout = TokioCommandExecutor::output(self.program.as_os_str(), ["-F", &*url]).await?;
        let formats = parse_format_listing(stdout.lines());

        ::tracing::debug!(%url, count = formats.len(), "parsed format listing");

        Ok(formats)
    }
}

#[async_trait]
impl PlaylistInspector for YtdlpDownloader {
    async fn inspect(self: ::std::sync::Arc<Self>, url: MaybeOwnedString) -> Fallible<PlaylistSummary> {
        let stdout = TokioCommandExecutor::output(self.program.as_os_str(), ["--flat-playlist", "--dump-json", &*url]).await?;

        parse_playlist_summary(stdout.lines())
    }
}

#[async_trait]
impl VersionSource for YtdlpDownloader {
    async fn version(self: ::std::sync::Arc<Self>) -> Fallible<MaybeOwnedString> {
        let stdout = TokioCommandExecutor::output(self.program.as_os_str(), ["--version"]).await?;

        Ok(stdout.lines().next().unwrap_or_default().trim().to_owned().into())
    }
}

#[async_trait]
impl Downloader for YtdlpDownloader {
    async fn download(
        self: ::std::sync::Arc<Self>, request: DownloadRequest, cancellation: ::tokio_util::sync::CancellationToken,
    ) -> Fallible<DownloadHandle> {
        let (download_events_tx, download_events_rx) = ::tokio::sync::mpsc::unbounded_channel();
        let (diagnostic_events_tx, diagnostic_events_rx) = ::tokio::sync::mpsc::unbounded_channel();

        let args = download_arguments(&request)?;

        ::tracing::debug!(program = %self.program.display(), ?args, "spawning download");

        let process = TokioCommandExecutor::execute(self.program.as_os_str(), &args)?;

        let token = cancellation;

        ::tokio::spawn(async move {
            let outcome = supervise(process, &download_events_tx, diagnostic_events_tx, &token)
                .await
                .unwrap_or_else(|err| match token.is_cancelled() {
                    true => DownloadOutcome::Cancelled,
                    false => DownloadOutcome::Failed(DownloadError::DownloadFailure(err.to_string().into()).to_string().into()),
                });

            download_events_tx.send(DownloadEvent::Finished(outcome)).ok();
        });

        Ok(DownloadHandle::new(
            ::std::boxed::Box::pin(::tokio_stream::wrappers::UnboundedReceiverStream::new(download_events_rx)),
            ::std::boxed::Box::pin(::tokio_stream::wrappers::UnboundedReceiverStream::new(diagnostic_events_rx)),
        ))
    }
}

/// Owns the child until it exits or is cancelled. Progress goes out on
/// `download_events_tx` as lines arrive; the outcome is returned.
async fn supervise(
    process: RunningCommand,
    download_events_tx: &::tokio::sync::mpsc::UnboundedSender<DownloadEvent>,
    diagnostic_events_tx: ::tokio::sync::mpsc::UnboundedSender<DiagnosticEvent>,
    cancellation: &::tokio_util::sync::CancellationToken,
) -> Fallible<DownloadOutcome> {
    let RunningCommand { mut process, mut stdout, stderr } = process;

    let stderr = ::tokio::spawn(async move {
        stderr
            .inspect(|line| {
                if let Some(event) = DiagnosticEvent::from_line(line) {
                    diagnostic_events_tx.send(event).ok();
                }
            })
            .collect::<Vec<_>>()
            .await
            .join("\n")
    });

    let mut parser = ProgressParser::default();

    loop {
        ::tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            line = stdout.next() => match line {
                Some(line) => {
                    ::tracing::debug!(%line, "yt-dlp");

                    if let Some(event) = parser.parse(&line) {
                        download_events_tx.send(DownloadEvent::ProgressUpdated(event))?;
                    }
                },
                None => break,
            },
        }
    }

    let status = ::tokio::select! {
        biased;

        _ = cancellation.cancelled() => None,
        status = process.wait() => Some(status?),
    };

    let Some(status) = status.filter(|_| !cancellation.is_cancelled()) else {
        ::tracing::info!("terminating cancelled download");

        process.kill().await.ok();
        stderr.abort();

        return Ok(DownloadOutcome::Cancelled);
    };

    let stderr = stderr.await?;

    if status.success() {
        return Ok(DownloadOutcome::Completed);
    }

    let message = match stderr.trim() {
        "" => format!("yt-dlp exited with {}", status),
        stderr => stderr.to_owned(),
    };

    ::tracing::warn!(%status, "yt-dlp exited unsuccessfully");

    Ok(DownloadOutcome::Failed(message.into()))
}

/// `Best` asks for the best streams, a resolution caps the video height, and
/// a listed format is paired with the best audio unless it is audio already.
pub fn format_selector(quality: &Quality) -> Result<MaybeOwnedString, DownloadError> {
    match quality {
        Quality::Best => Ok("bestvideo+bestaudio/best".into()),

        Quality::Resolution(resolution) => {
            let height = quality
                .height()
                .ok_or_else(|| DownloadError::invalid_input(format!("`{}` is not a resolution", resolution)))?;

            Ok(format!("bestvideo[height<={}]+bestaudio/best", height).into())
        },

        Quality::Format(FormatEntry { id, resolution: Resolution::AudioOnly, .. }) => Ok(id.clone()),
        Quality::Format(FormatEntry { id, .. }) => Ok(format!("{}+bestaudio", id).into()),
    }
}

pub fn output_template(request: &DownloadRequest) -> ::std::path::PathBuf {
    let template = match request.filename.as_deref().map(str::trim) {
        Some(filename) if !filename.is_empty() => format!("{}.%(ext)s", filename),
        _ => "%(title)s.%(ext)s".to_owned(),
    };

    request.directory.join(template)
}

pub fn download_arguments(request: &DownloadRequest) -> Result<Vec<::std::ffi::OsString>, DownloadError> {
    let mut args: Vec<::std::ffi::OsString> = vec![
        "--newline".into(),
        "-f".into(),
        format_selector(&request.quality)?.into_owned().into(),
        "-o".into(),
        output_template(request).into(),
    ];

    if request.subtitles {
        args.push("--write-auto-sub".into());
        args.push("--sub-lang".into());
        args.push((&*request.subtitle_language).into());
    }

    if request.embed_metadata {
        args.push("--embed-metadata".into());
    }

    if request.embed_thumbnail {
        args.push("--embed-thumbnail".into());
    }

    args.push(match request.scope {
        Scope::Playlist => "--yes-playlist".into(),
        Scope::Video => "--no-playlist".into(),
    });

    args.push((&*request.url).into());

    Ok(args)
}

struct RunningCommand {
    process: ::tokio::process::Child,
    stdout: BoxedStream<MaybeOwnedString>,
    stderr: BoxedStream<MaybeOwnedString>,
}

struct TokioCommandExecutor;

impl TokioCommandExecutor {
    fn execute<Program, Args>(program: Program, args: Args) -> Fallible<RunningCommand>
    where
        Program: AsRef<::std::ffi::OsStr>,
        Args: IntoIterator,
        Args::Item: AsRef<::std::ffi::OsStr>,
    {
        use ::tokio::io::AsyncBufReadExt as _;

        let (stdout_tx, stdout_rx) = ::tokio::sync::mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = ::tokio::sync::mpsc::unbounded_channel();

        let program = program.as_ref();

        let mut process = ::tokio::process::Command::new(program)
            .args(args)
            .stdin(::std::process::Stdio::null())
            .stdout(::std::process::Stdio::piped())
            .stderr(::std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| DownloadError::tool_invocation(format!("could not start `{}`: {}", program.to_string_lossy(), err)))?;

        let stdout = process.stdout.take().ok()?;
        let stderr = process.stderr.take().ok()?;

        ::tokio::spawn(async move {
            let lines = ::tokio::io::BufReader::new(stdout).lines();

            ::tokio_stream::wrappers::LinesStream::new(lines)
                .filter_map(|line| async move { line.ok() })
                .map(MaybeOwnedString::from)
                .map(Ok)
                .try_for_each(|line| async { stdout_tx.send(line) })
                .await
        });

        ::tokio::spawn(async move {
            let lines = ::tokio::io::BufReader::new(stderr).lines();

            ::tokio_stream::wrappers::LinesStream::new(lines)
                .filter_map(|line| async move { line.ok() })
                .map(MaybeOwnedString::from)
                .map(Ok)
                .try_for_each(|line| async { stderr_tx.send(line) })
                .await
        });

        Ok(RunningCommand {
            process,
            stdout: ::std::boxed::Box::pin(::tokio_stream::wrappers::UnboundedReceiverStream::new(stdout_rx)),
            stderr: ::std::boxed::Box::pin(::tokio_stream::wrappers::UnboundedReceiverStream::new(stderr_rx)),
        })
    }

    /// Runs to completion and returns stdout. A non-zero exit is a
    /// [`DownloadError::ToolInvocation`] carrying stderr.
    async fn output<Program, Args>(program: Program, args: Args) -> Fallible<String>
    where
        Program: AsRef<::std::ffi::OsStr>,
        Args: IntoIterator,
        Args::Item: AsRef<::std::ffi::OsStr>,
    {
        let program = program.as_ref();

        let output = ::tokio::process::Command::new(program)
            .args(args)
            .stdin(::std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| DownloadError::tool_invocation(format!("could not start `{}`: {}", program.to_string_lossy(), err)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            ::tracing::warn!(program = %program.to_string_lossy(), status = %output.status, "tool exited unsuccessfully");

            return Err(DownloadError::tool_invocation(match stderr.trim() {
                "" => format!("`{}` exited with {}", program.to_string_lossy(), output.status),
                stderr => stderr.to_owned(),
            })
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(quality: Quality, scope: Scope) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            scope,
            quality,
            filename: None,
            directory: ::std::path::Path::new("/downloads").to_path_buf().into(),
            subtitles: false,
            subtitle_language: "en".into(),
            embed_metadata: false,
            embed_thumbnail: false,
        }
    }

    fn strings(args: Vec<::std::ffi::OsString>) -> Vec<String> {
        args.into_iter().map(|arg| arg.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn selector_for_each_quality() {
        assert_eq!(format_selector(&Quality::Best).unwrap(), "bestvideo+bestaudio/best");
        assert_eq!(
            format_selector(&Quality::Resolution("1080p".into())).unwrap(),
            "bestvideo[height<=1080]+bestaudio/best",
        );
        assert_eq!(
            format_selector(&Quality::Resolution("1920x1080".into())).unwrap(),
            "bestvideo[height<=1080]+bestaudio/best",
        );
        assert!(matches!(
            format_selector(&Quality::Resolution("hd".into())),
            Err(DownloadError::InvalidInput(_)),
        ));
    }

    #[test]
    fn selector_for_listed_formats() {
        let video = FormatEntry {
            id: "22".into(),
            container: "mp4".into(),
            resolution: Resolution::Dimensions { width: 1280, height: 720 },
        };
        let audio = FormatEntry { id: "140".into(), container: "m4a".into(), resolution: Resolution::AudioOnly };

        assert_eq!(format_selector(&Quality::Format(video)).unwrap(), "22+bestaudio");
        assert_eq!(format_selector(&Quality::Format(audio)).unwrap(), "140");
    }

    #[test]
    fn default_arguments_for_a_single_video() {
        let args = strings(download_arguments(&request(Quality::Best, Scope::Video)).unwrap());

        assert_eq!(args, [
            "--newline",
            "-f",
            "bestvideo+bestaudio/best",
            "-o",
            "/downloads/%(title)s.%(ext)s",
            "--no-playlist",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        ]);
    }

    #[test]
    fn subtitles_only_when_requested() {
        let mut request = request(Quality::Best, Scope::Video);

        assert!(!strings(download_arguments(&request).unwrap()).iter().any(|arg| arg == "--write-auto-sub"));

        request.subtitles = true;
        request.subtitle_language = "de".into();

        let args = strings(download_arguments(&request).unwrap());
        let position = args.iter().position(|arg| arg == "--write-auto-sub").unwrap();
        assert_eq!(args[position + 1..position + 3], ["--sub-lang", "de"]);
    }

    #[test]
    fn playlist_scope_and_custom_filename() {
        let mut request = request(Quality::Resolution("720p".into()), Scope::Playlist);
        request.filename = Some("lecture".into());
        request.embed_metadata = true;
        request.embed_thumbnail = true;

        let args = strings(download_arguments(&request).unwrap());

        assert!(args.contains(&"/downloads/lecture.%(ext)s".to_owned()));
        assert!(args.contains(&"--yes-playlist".to_owned()));
        assert!(!args.contains(&"--no-playlist".to_owned()));
        assert!(args.contains(&"--embed-metadata".to_owned()));
        assert!(args.contains(&"--embed-thumbnail".to_owned()));
    }

    #[test]
    fn blank_filename_uses_title_template() {
        let mut request = request(Quality::Best, Scope::Video);
        request.filename = Some("  ".into());

        assert_eq!(output_template(&request), ::std::path::Path::new("/downloads/%(title)s.%(ext)s"));
    }
}
