pub(crate) mod utils;

use ::domain::DownloadOutcome;
use ::domain::Settings;
use ::infrastructures::boundaries::AggregateView;
use ::infrastructures::gateways::downloaders::YtdlpDownloader;
use ::infrastructures::gateways::releases::GithubReleaseChecker;
use ::infrastructures::gateways::repositories::default_settings_path;
use ::infrastructures::gateways::repositories::JsonSettingsRepository;
use ::use_cases::boundaries::Accept;
use ::use_cases::boundaries::CheckUpdatesOutputBoundary;
use ::use_cases::boundaries::CheckUpdatesRequestModel;
use ::use_cases::boundaries::DownloadOutputBoundary;
use ::use_cases::boundaries::DownloadRequestModel;
use ::use_cases::boundaries::FetchFormatsOutputBoundary;
use ::use_cases::boundaries::FetchFormatsRequestModel;
use ::use_cases::boundaries::SettingsOutputBoundary;
use ::use_cases::boundaries::ShowSettingsRequestModel;
use ::use_cases::boundaries::UpdateSettingsRequestModel;
use ::use_cases::catalog::FormatCatalog;
use ::use_cases::gateways::Downloader;
use ::use_cases::gateways::FormatLister;
use ::use_cases::gateways::PlaylistInspector;
use ::use_cases::gateways::SettingsRepository;
use ::use_cases::gateways::VersionSource;
use ::use_cases::interactors::CheckUpdatesInteractor;
use ::use_cases::interactors::DownloadInteractor;
use ::use_cases::interactors::FetchFormatsInteractor;
use ::use_cases::interactors::ShowSettingsInteractor;
use ::use_cases::interactors::UpdateSettingsInteractor;
use ::use_cases::models::errors::DownloadError;
use ::use_cases::policies::UrlPolicy;

use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedPath;
use crate::utils::aliases::MaybeOwnedString;
use crate::utils::extensions::OptionExt;

const EXIT_INVALID_INPUT: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

const RELEASES_REPOSITORY: &str = "yt-dlp/yt-dlp";

#[tokio::main]
async fn main() -> Fallible<::std::process::ExitCode> {
    let matches = command().get_matches();

    let settings_path = match matches.get_one::<::std::path::PathBuf>("config") {
        Some(path) => path.to_owned(),
        None => default_settings_path()?,
    };

    let settings = ::std::sync::Arc::new(JsonSettingsRepository::builder().path(settings_path).build());
    let current = ::std::sync::Arc::clone(&settings).load().await?;

    let _guard = init_tracing(&current.log_directory)?;

    ::tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

    match run(&matches, settings, current).await {
        Ok(code) => Ok(code),
        Err(err) => {
            ::tracing::error!(error = %err, "command failed");
            eprintln!("error: {:#}", err);

            Ok(match err.downcast_ref::<DownloadError>() {
                Some(DownloadError::InvalidInput(_)) => ::std::process::ExitCode::from(EXIT_INVALID_INPUT),
                _ => ::std::process::ExitCode::FAILURE,
            })
        },
    }
}

async fn run(
    matches: &::clap::ArgMatches, settings: ::std::sync::Arc<JsonSettingsRepository>, current: Settings,
) -> Fallible<::std::process::ExitCode> {
    let view = ::std::sync::Arc::new(AggregateView::new());

    let downloader = |matches: &::clap::ArgMatches| {
        let program: MaybeOwnedPath = matches
            .get_one::<::std::path::PathBuf>("program")
            .map_or_else(|| current.program.clone(), |program| program.to_owned().into());

        ::std::sync::Arc::new(YtdlpDownloader::builder().program(program).build())
    };

    let catalog = ::std::sync::Arc::new(FormatCatalog::default());
    let policy = UrlPolicy::new(current.domains.iter().cloned());

    match matches.subcommand() {
        Some(("formats", matches)) => {
            let downloader = downloader(matches);
            let interactor = ::std::sync::Arc::new(
                FetchFormatsInteractor::builder()
                    .view(::std::sync::Arc::clone(&view) as ::std::sync::Arc<dyn FetchFormatsOutputBoundary>)
                    .policy(policy)
                    .catalog(catalog)
                    .lister(::std::sync::Arc::clone(&downloader) as ::std::sync::Arc<dyn FormatLister>)
                    .build(),
            );

            let request = FetchFormatsRequestModel::builder()
                .url(matches.get_one::<::std::string::String>("url").ok()?.to_owned())
                .build();
            interactor.accept(request).await?;

            Ok(::std::process::ExitCode::SUCCESS)
        },

        Some(("download", matches)) => {
            let downloader = downloader(matches);
            let interactor = ::std::sync::Arc::new(
                DownloadInteractor::builder()
                    .view(::std::sync::Arc::clone(&view) as ::std::sync::Arc<dyn DownloadOutputBoundary>)
                    .policy(policy)
                    .catalog(catalog)
                    .lister(::std::sync::Arc::clone(&downloader) as ::std::sync::Arc<dyn FormatLister>)
                    .inspector(::std::sync::Arc::clone(&downloader) as ::std::sync::Arc<dyn PlaylistInspector>)
                    .downloader(::std::sync::Arc::clone(&downloader) as ::std::sync::Arc<dyn Downloader>)
                    .attempts(matches.get_one::<u32>("attempts").copied().unwrap_or(current.attempts))
                    .build(),
            );

            let cancellation = ::tokio_util::sync::CancellationToken::new();

            ::tokio::spawn({
                let cancellation = cancellation.clone();

                async move {
                    if ::tokio::signal::ctrl_c().await.is_ok() {
                        ::tracing::info!("interrupt received, cancelling download");
                        cancellation.cancel();
                    }
                }
            });

            let quality: MaybeOwnedString = matches
                .get_one::<::std::string::String>("quality")
                .map_or_else(|| current.quality.clone(), |quality| quality.to_owned().into());
            let directory: MaybeOwnedPath = matches
                .get_one::<::std::path::PathBuf>("output")
                .map_or_else(|| current.output_directory.clone(), |directory| directory.to_owned().into());
            let subtitle_language: MaybeOwnedString = matches
                .get_one::<::std::string::String>("sub-lang")
                .map_or_else(|| current.subtitle_language.clone(), |language| language.to_owned().into());

            let request = DownloadRequestModel::builder()
                .url(matches.get_one::<::std::string::String>("url").ok()?.to_owned())
                .quality(quality)
                .maybe_format_id(matches.get_one::<::std::string::String>("format").cloned())
                .maybe_filename(matches.get_one::<::std::string::String>("filename").cloned())
                .directory(directory)
                .subtitles(toggle(matches, "subtitles", current.subtitles))
                .subtitle_language(subtitle_language)
                .embed_metadata(toggle(matches, "embed-metadata", current.embed_metadata))
                .embed_thumbnail(toggle(matches, "embed-thumbnail", current.embed_thumbnail))
                .cancellation(cancellation)
                .build();

            Ok(match interactor.accept(request).await? {
                DownloadOutcome::Completed => ::std::process::ExitCode::SUCCESS,
                DownloadOutcome::Cancelled => ::std::process::ExitCode::from(EXIT_CANCELLED),
                DownloadOutcome::Failed(_) => ::std::process::ExitCode::FAILURE,
            })
        },

        Some(("check-updates", matches)) => {
            let downloader = downloader(matches);
            let interactor = ::std::sync::Arc::new(
                CheckUpdatesInteractor::builder()
                    .view(::std::sync::Arc::clone(&view) as ::std::sync::Arc<dyn CheckUpdatesOutputBoundary>)
                    .installed(::std::sync::Arc::clone(&downloader) as ::std::sync::Arc<dyn VersionSource>)
                    .latest(::std::sync::Arc::new(GithubReleaseChecker::new(RELEASES_REPOSITORY)) as ::std::sync::Arc<dyn VersionSource>)
                    .build(),
            );

            interactor.accept(CheckUpdatesRequestModel).await?;

            Ok(::std::process::ExitCode::SUCCESS)
        },

        Some(("settings", matches)) => match matches.subcommand() {
            Some(("show", _)) => {
                let interactor = ::std::sync::Arc::new(
                    ShowSettingsInteractor::builder()
                        .view(::std::sync::Arc::clone(&view) as ::std::sync::Arc<dyn SettingsOutputBoundary>)
                        .settings(settings as ::std::sync::Arc<dyn SettingsRepository>)
                        .build(),
                );

                interactor.accept(ShowSettingsRequestModel).await?;

                Ok(::std::process::ExitCode::SUCCESS)
            },

            Some(("set", matches)) => {
                let interactor = ::std::sync::Arc::new(
                    UpdateSettingsInteractor::builder()
                        .view(::std::sync::Arc::clone(&view) as ::std::sync::Arc<dyn SettingsOutputBoundary>)
                        .settings(settings as ::std::sync::Arc<dyn SettingsRepository>)
                        .build(),
                );

                let request = UpdateSettingsRequestModel {
                    output_directory: matches
                        .get_one::<::std::path::PathBuf>("output-directory")
                        .map(|directory| directory.to_owned().into()),
                    quality: matches
                        .get_one::<::std::string::String>("quality")
                        .map(|quality| quality.to_owned().into()),
                    subtitles: matches.get_one::<bool>("subtitles").copied(),
                    subtitle_language: matches
                        .get_one::<::std::string::String>("subtitle-language")
                        .map(|language| language.to_owned().into()),
                    embed_metadata: matches.get_one::<bool>("embed-metadata").copied(),
                    embed_thumbnail: matches.get_one::<bool>("embed-thumbnail").copied(),
                    attempts: matches.get_one::<u32>("attempts").copied(),
                    program: matches
                        .get_one::<::std::path::PathBuf>("program")
                        .map(|program| program.to_owned().into()),
                };

                interactor.accept(request).await?;

                Ok(::std::process::ExitCode::SUCCESS)
            },

            _ => unreachable!(),
        },

        _ => unreachable!(),
    }
}

fn init_tracing(directory: &::std::path::Path) -> Fallible<::tracing_appender::non_blocking::WorkerGuard> {
    let writer = ::tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(::tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("tubeloader")
        .filename_suffix("log")
        .build(directory)?;
    let (writer, guard) = ::tracing_appender::non_blocking(writer);

    let filter = ::tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| ::tracing_subscriber::EnvFilter::new("info"));

    ::tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Resolves a `--flag`/`--no-flag` pair, falling back to the stored setting
/// when neither was given.
fn toggle(matches: &::clap::ArgMatches, flag: &str, stored: bool) -> bool {
    match (matches.get_flag(flag), matches.get_flag(&format!("no-{}", flag))) {
        (true, _) => true,
        (_, true) => false,
        _ => stored,
    }
}

fn command() -> ::clap::Command {
    let url = ::clap::Arg::new("url")
        .required(true)
        .value_parser(::clap::value_parser!(::std::string::String));

    ::clap::Command::new("tubeloader")
        .about("Download videos and playlists with yt-dlp")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            ::clap::Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(::clap::value_parser!(::std::path::PathBuf)),
        )
        .subcommand(
            ::clap::Command::new("formats")
                .about("List the formats offered for a URL")
                .arg(url.clone())
                .arg(
                    ::clap::Arg::new("program")
                        .long("program")
                        .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                ),
        )
        .subcommand(
            ::clap::Command::new("download")
                .about("Download a video or a playlist")
                .arg(url)
                .arg(
                    ::clap::Arg::new("quality")
                        .short('q')
                        .long("quality")
                        .help("`best` or a resolution such as `720p`")
                        .value_parser(::clap::value_parser!(::std::string::String)),
                )
                .arg(
                    ::clap::Arg::new("format")
                        .short('f')
                        .long("format")
                        .help("A format id from `tubeloader formats`")
                        .conflicts_with("quality")
                        .value_parser(::clap::value_parser!(::std::string::String)),
                )
                .arg(
                    ::clap::Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                )
                .arg(
                    ::clap::Arg::new("filename")
                        .short('n')
                        .long("filename")
                        .value_parser(::clap::value_parser!(::std::string::String)),
                )
                .arg(
                    ::clap::Arg::new("subtitles")
                        .long("subtitles")
                        .overrides_with("no-subtitles")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("no-subtitles")
                        .long("no-subtitles")
                        .overrides_with("subtitles")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("sub-lang")
                        .long("sub-lang")
                        .value_parser(::clap::value_parser!(::std::string::String)),
                )
                .arg(
                    ::clap::Arg::new("embed-metadata")
                        .long("embed-metadata")
                        .overrides_with("no-embed-metadata")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("no-embed-metadata")
                        .long("no-embed-metadata")
                        .overrides_with("embed-metadata")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("embed-thumbnail")
                        .long("embed-thumbnail")
                        .overrides_with("no-embed-thumbnail")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("no-embed-thumbnail")
                        .long("no-embed-thumbnail")
                        .overrides_with("embed-thumbnail")
                        .action(::clap::ArgAction::SetTrue),
                )
                .arg(
                    ::clap::Arg::new("attempts")
                        .long("attempts")
                        .value_parser(::clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    ::clap::Arg::new("program")
                        .long("program")
                        .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                ),
        )
        .subcommand(
            ::clap::Command::new("check-updates")
                .about("Compare the installed yt-dlp with the latest release")
                .arg(
                    ::clap::Arg::new("program")
                        .long("program")
                        .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                ),
        )
        .subcommand(
            ::clap::Command::new("settings")
                .about("Show or change stored settings")
                .subcommand_required(true)
                .subcommand(::clap::Command::new("show"))
                .subcommand(
                    ::clap::Command::new("set")
                        .arg_required_else_help(true)
                        .arg(
                            ::clap::Arg::new("output-directory")
                                .long("output-directory")
                                .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                        )
                        .arg(
                            ::clap::Arg::new("quality")
                                .long("quality")
                                .value_parser(::clap::value_parser!(::std::string::String)),
                        )
                        .arg(
                            ::clap::Arg::new("subtitles")
                                .long("subtitles")
                                .value_parser(::clap::value_parser!(bool)),
                        )
                        .arg(
                            ::clap::Arg::new("subtitle-language")
                                .long("subtitle-language")
                                .value_parser(::clap::value_parser!(::std::string::String)),
                        )
                        .arg(
                            ::clap::Arg::new("embed-metadata")
                                .long("embed-metadata")
                                .value_parser(::clap::value_parser!(bool)),
                        )
                        .arg(
                            ::clap::Arg::new("embed-thumbnail")
                                .long("embed-thumbnail")
                                .value_parser(::clap::value_parser!(bool)),
                        )
                        .arg(
                            ::clap::Arg::new("attempts")
                                .long("attempts")
                                .value_parser(::clap::value_parser!(u32)),
                        )
                        .arg(
                            ::clap::Arg::new("program")
                                .long("program")
                                .value_parser(::clap::value_parser!(::std::path::PathBuf)),
                        ),
                ),
        )
}
