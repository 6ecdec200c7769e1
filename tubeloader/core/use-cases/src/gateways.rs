use ::async_trait::async_trait;
use ::domain::DownloadRequest;
use ::domain::FormatEntry;
use ::domain::PlaylistSummary;
use ::domain::Settings;

use crate::models::events::DiagnosticEvent;
use crate::models::events::DownloadEvent;
use crate::utils::aliases::BoxedStream;
use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedString;

#[async_trait]
pub trait FormatLister: Send + Sync {
    /// Fails with [`crate::models::errors::DownloadError::ToolInvocation`] when
    /// the tool is missing or exits unsuccessfully.
    async fn list(self: ::std::sync::Arc<Self>, url: MaybeOwnedString) -> Fallible<Vec<FormatEntry>>;
}

#[async_trait]
pub trait PlaylistInspector: Send + Sync {
    async fn inspect(self: ::std::sync::Arc<Self>, url: MaybeOwnedString) -> Fallible<PlaylistSummary>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns as soon as the run is underway. The event stream ends with
    /// exactly one [`DownloadEvent::Finished`].
    async fn download(
        self: ::std::sync::Arc<Self>, request: DownloadRequest, cancellation: ::tokio_util::sync::CancellationToken,
    ) -> Fallible<DownloadHandle>;
}

#[derive(::derive_new::new)]
pub struct DownloadHandle {
    pub events: BoxedStream<DownloadEvent>,
    pub diagnostics: BoxedStream<DiagnosticEvent>,
}

#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn version(self: ::std::sync::Arc<Self>) -> Fallible<MaybeOwnedString>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(self: ::std::sync::Arc<Self>) -> Fallible<Settings>;
    async fn save(self: ::std::sync::Arc<Self>, settings: &Settings) -> Fallible<()>;
}
