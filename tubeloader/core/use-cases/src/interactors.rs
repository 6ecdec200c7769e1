use ::async_trait::async_trait;
use ::domain::DownloadOutcome;
use ::domain::DownloadRequest;
use ::domain::FormatEntry;
use ::domain::Quality;
use ::domain::Scope;
use ::domain::Settings;
use ::futures::prelude::*;

use crate::boundaries::Accept;
use crate::boundaries::CheckUpdatesOutputBoundary;
use crate::boundaries::CheckUpdatesRequestModel;
use crate::boundaries::DownloadOutputBoundary;
use crate::boundaries::DownloadRequestModel;
use crate::boundaries::FetchFormatsOutputBoundary;
use crate::boundaries::FetchFormatsRequestModel;
use crate::boundaries::SettingsOutputBoundary;
use crate::boundaries::ShowSettingsRequestModel;
use crate::boundaries::Update;
use crate::boundaries::UpdateSettingsRequestModel;
use crate::catalog::FormatCatalog;
use crate::gateways::DownloadHandle;
use crate::gateways::Downloader;
use crate::gateways::FormatLister;
use crate::gateways::PlaylistInspector;
use crate::gateways::SettingsRepository;
use crate::gateways::VersionSource;
use crate::models::errors::DownloadError;
use crate::models::events::DiagnosticEvent;
use crate::models::events::DiagnosticLevel;
use crate::models::events::DownloadEvent;
use crate::models::events::DownloadStartedEvent;
use crate::models::events::FormatsFetchedEvent;
use crate::models::reports::VersionReport;
use crate::policies::UrlPolicy;
use crate::utils::aliases::Fallible;

#[derive(::bon::Builder)]
pub struct FetchFormatsInteractor {
    view: ::std::sync::Arc<dyn FetchFormatsOutputBoundary>,

    policy: UrlPolicy,
    catalog: ::std::sync::Arc<FormatCatalog>,
    lister: ::std::sync::Arc<dyn FormatLister>,
}

#[async_trait]
impl Accept<FetchFormatsRequestModel, Vec<FormatEntry>> for FetchFormatsInteractor {
    async fn accept(self: ::std::sync::Arc<Self>, request: FetchFormatsRequestModel) -> Fallible<Vec<FormatEntry>> {
        let request = FetchFormatsRequestModel { url: request.url.trim().to_owned().into() };

        self.policy.validate(&request.url)?;

        ::std::sync::Arc::clone(&self.view).activate().await?;

        let formats = match ::std::sync::Arc::clone(&self.lister).list(request.url.clone()).await {
            Ok(formats) => formats,
            Err(err) => {
                ::tracing::error!(url = %request.url, error = %err, "listing formats failed");

                let event = DiagnosticEvent { level: DiagnosticLevel::Error, message: err.to_string().into() };
                Update::<DiagnosticEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;
                ::std::sync::Arc::clone(&self.view).deactivate().await?;

                return Err(err);
            },
        };

        ::tracing::info!(url = %request.url, count = formats.len(), "listed formats");

        self.catalog.replace(formats.clone());

        let event = FormatsFetchedEvent { formats: formats.clone() };
        Update::<FormatsFetchedEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;

        ::std::sync::Arc::clone(&self.view).deactivate().await?;

        Ok(formats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Running,
}

#[derive(::bon::Builder)]
pub struct DownloadInteractor {
    view: ::std::sync::Arc<dyn DownloadOutputBoundary>,

    policy: UrlPolicy,
    catalog: ::std::sync::Arc<FormatCatalog>,
    lister: ::std::sync::Arc<dyn FormatLister>,
    inspector: ::std::sync::Arc<dyn PlaylistInspector>,
    downloader: ::std::sync::Arc<dyn Downloader>,

    #[builder(default = 1)]
    attempts: u32,

    #[builder(skip = ::std::sync::atomic::AtomicBool::new(false))]
    running: ::std::sync::atomic::AtomicBool,
}

impl DownloadInteractor {
    pub fn state(&self) -> DownloadState {
        match self.running.load(::std::sync::atomic::Ordering::Acquire) {
            true => DownloadState::Running,
            false => DownloadState::Idle,
        }
    }

    fn enter(&self) -> Result<RunningGuard<'_>, DownloadError> {
        self.running
            .compare_exchange(
                false,
                true,
                ::std::sync::atomic::Ordering::AcqRel,
                ::std::sync::atomic::Ordering::Acquire,
            )
            .map(|_| RunningGuard(&self.running))
            .map_err(|_| DownloadError::Busy)
    }

    async fn resolve_quality(self: ::std::sync::Arc<Self>, request: &DownloadRequestModel) -> Fallible<Quality> {
        if let Some(format_id) = request.format_id.as_deref() {
            let formats = ::std::sync::Arc::clone(&self.lister).list(request.url.clone()).await?;
            self.catalog.replace(formats);

            let format = self
                .catalog
                .find(format_id)
                .ok_or_else(|| DownloadError::invalid_input(format!("format `{}` is not offered for this URL", format_id)))?;

            return Ok(Quality::Format(format));
        }

        let quality: Quality = request.quality.parse()?;

        if let Quality::Resolution(ref resolution) = quality {
            quality
                .height()
                .ok_or_else(|| DownloadError::invalid_input(format!("`{}` is not a resolution", resolution)))?;
        }

        Ok(quality)
    }

    async fn attempt(self: ::std::sync::Arc<Self>, handle: DownloadHandle) -> Fallible<DownloadOutcome> {
        let DownloadHandle { mut events, mut diagnostics, .. } = handle;

        let (outcome, _) = ::tokio::try_join!(
            async {
                let mut outcome = None;

                while let Some(event) = events.next().await {
                    match event {
                        DownloadEvent::Finished(finished) => outcome = Some(finished),
                        event => Update::<DownloadEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?,
                    }
                }

                Fallible::Ok(outcome.unwrap_or_else(|| DownloadOutcome::Failed("the downloader stopped without reporting an outcome".into())))
            },
            async {
                while let Some(event) = diagnostics.next().await {
                    Update::<DiagnosticEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;
                }

                Fallible::Ok(())
            },
        )?;

        Ok(outcome)
    }
}

struct RunningGuard<'a>(&'a ::std::sync::atomic::AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, ::std::sync::atomic::Ordering::Release);
    }
}

#[async_trait]
impl Accept<DownloadRequestModel, DownloadOutcome> for DownloadInteractor {
    async fn accept(self: ::std::sync::Arc<Self>, request: DownloadRequestModel) -> Fallible<DownloadOutcome> {
        let _running = self.enter()?;

        let request = DownloadRequestModel { url: request.url.trim().to_owned().into(), ..request };

        let scope = self.policy.validate(&request.url)?;
        let quality = ::std::sync::Arc::clone(&self).resolve_quality(&request).await?;

        let filename = request
            .filename
            .clone()
            .filter(|filename| !filename.trim().is_empty());

        let download = DownloadRequest {
            url: request.url.clone(),
            scope,
            quality,
            filename,
            directory: request.directory.clone(),
            subtitles: request.subtitles,
            subtitle_language: request.subtitle_language.clone(),
            embed_metadata: request.embed_metadata,
            embed_thumbnail: request.embed_thumbnail,
        };

        ::std::sync::Arc::clone(&self.view).activate().await?;

        if scope == Scope::Playlist {
            match ::std::sync::Arc::clone(&self.inspector).inspect(request.url.clone()).await {
                Ok(summary) => {
                    let event = DownloadEvent::PlaylistResolved(summary);
                    Update::<DownloadEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;
                },

                Err(err) => {
                    ::tracing::warn!(url = %request.url, error = %err, "could not inspect playlist");

                    let event = DiagnosticEvent {
                        level: DiagnosticLevel::Warning,
                        message: format!("could not fetch playlist info: {}", err).into(),
                    };
                    Update::<DiagnosticEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;
                },
            }
        }

        let attempts = self.attempts.max(1);
        let mut outcome = DownloadOutcome::Cancelled;

        for attempt in 1..=attempts {
            if request.cancellation.is_cancelled() {
                outcome = DownloadOutcome::Cancelled;
                break;
            }

            let event = DownloadEvent::Started(DownloadStartedEvent { attempt, attempts });
            Update::<DownloadEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;

            ::tracing::info!(url = %download.url, quality = %download.quality, attempt, attempts, "starting download");

            outcome = match ::std::sync::Arc::clone(&self.downloader)
                .download(download.clone(), request.cancellation.clone())
                .await
            {
                Ok(handle) => ::std::sync::Arc::clone(&self).attempt(handle).await?,
                Err(err) => DownloadOutcome::Failed(err.to_string().into()),
            };

            if request.cancellation.is_cancelled() {
                outcome = DownloadOutcome::Cancelled;
            }

            match outcome {
                DownloadOutcome::Failed(ref message) if attempt < attempts => {
                    ::tracing::warn!(attempt, attempts, error = %message, "download attempt failed, retrying");

                    let event = DiagnosticEvent {
                        level: DiagnosticLevel::Warning,
                        message: format!("attempt {}/{} failed, retrying: {}", attempt, attempts, message).into(),
                    };
                    Update::<DiagnosticEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;
                },

                _ => break,
            }
        }

        match outcome {
            DownloadOutcome::Completed => ::tracing::info!(url = %download.url, "download completed"),
            DownloadOutcome::Cancelled => ::tracing::info!(url = %download.url, "download cancelled"),
            DownloadOutcome::Failed(ref message) => ::tracing::error!(url = %download.url, error = %message, "download failed"),
        }

        let event = DownloadEvent::Finished(outcome.clone());
        Update::<DownloadEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;

        ::std::sync::Arc::clone(&self.view).deactivate().await?;

        Ok(outcome)
    }
}

#[derive(::bon::Builder)]
pub struct CheckUpdatesInteractor {
    view: ::std::sync::Arc<dyn CheckUpdatesOutputBoundary>,

    installed: ::std::sync::Arc<dyn VersionSource>,
    latest: ::std::sync::Arc<dyn VersionSource>,
}

#[async_trait]
impl Accept<CheckUpdatesRequestModel, VersionReport> for CheckUpdatesInteractor {
    async fn accept(self: ::std::sync::Arc<Self>, _: CheckUpdatesRequestModel) -> Fallible<VersionReport> {
        let versions = ::tokio::try_join!(
            ::std::sync::Arc::clone(&self.installed).version(),
            ::std::sync::Arc::clone(&self.latest).version(),
        );

        let (installed, latest) = match versions {
            Ok(versions) => versions,
            Err(err) => {
                let event = DiagnosticEvent {
                    level: DiagnosticLevel::Error,
                    message: format!("failed to check for updates: {}", err).into(),
                };
                Update::<DiagnosticEvent>::update(::std::sync::Arc::clone(&self.view), &event).await?;

                return Err(err);
            },
        };

        let report = VersionReport::compare(installed, latest);
        Update::<VersionReport>::update(::std::sync::Arc::clone(&self.view), &report).await?;

        Ok(report)
    }
}

#[derive(::bon::Builder)]
pub struct ShowSettingsInteractor {
    view: ::std::sync::Arc<dyn SettingsOutputBoundary>,
    settings: ::std::sync::Arc<dyn SettingsRepository>,
}

#[async_trait]
impl Accept<ShowSettingsRequestModel, Settings> for ShowSettingsInteractor {
    async fn accept(self: ::std::sync::Arc<Self>, _: ShowSettingsRequestModel) -> Fallible<Settings> {
        let settings = ::std::sync::Arc::clone(&self.settings).load().await?;
        ::std::sync::Arc::clone(&self.view).update(&settings).await?;

        Ok(settings)
    }
}

#[derive(::bon::Builder)]
pub struct UpdateSettingsInteractor {
    view: ::std::sync::Arc<dyn SettingsOutputBoundary>,
    settings: ::std::sync::Arc<dyn SettingsRepository>,
}

#[async_trait]
impl Accept<UpdateSettingsRequestModel, Settings> for UpdateSettingsInteractor {
    async fn accept(self: ::std::sync::Arc<Self>, request: UpdateSettingsRequestModel) -> Fallible<Settings> {
        let mut settings = ::std::sync::Arc::clone(&self.settings).load().await?;

        if let Some(quality) = request.quality {
            let parsed: Quality = quality.parse()?;

            if matches!(parsed, Quality::Resolution(_)) && parsed.height().is_none() {
                return Err(DownloadError::invalid_input(format!("`{}` is not a resolution", quality)).into());
            }

            settings.quality = quality;
        }

        if let Some(attempts) = request.attempts {
            if attempts == 0 {
                return Err(DownloadError::invalid_input("attempts must be at least 1").into());
            }

            settings.attempts = attempts;
        }

        if let Some(output_directory) = request.output_directory {
            settings.output_directory = output_directory;
        }
        if let Some(subtitles) = request.subtitles {
            settings.subtitles = subtitles;
        }
        if let Some(subtitle_language) = request.subtitle_language {
            settings.subtitle_language = subtitle_language;
        }
        if let Some(embed_metadata) = request.embed_metadata {
            settings.embed_metadata = embed_metadata;
        }
        if let Some(embed_thumbnail) = request.embed_thumbnail {
            settings.embed_thumbnail = embed_thumbnail;
        }
        if let Some(program) = request.program {
            settings.program = program;
        }

        ::std::sync::Arc::clone(&self.settings).save(&settings).await?;
        ::tracing::info!("settings saved");

        ::std::sync::Arc::clone(&self.view).update(&settings).await?;

        Ok(settings)
    }
}
