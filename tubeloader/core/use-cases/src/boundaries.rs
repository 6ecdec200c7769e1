use ::async_trait::async_trait;
use ::domain::Settings;

use crate::models::events::DiagnosticEvent;
use crate::models::events::DownloadEvent;
use crate::models::events::FormatsFetchedEvent;
use crate::models::reports::VersionReport;
use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedPath;
use crate::utils::aliases::MaybeOwnedString;

#[async_trait]
pub trait Accept<Request, Response = ()>: Send + Sync {
    async fn accept(self: ::std::sync::Arc<Self>, request: Request) -> Fallible<Response>;
}

#[async_trait]
pub trait Activate: Send + Sync {
    async fn activate(self: ::std::sync::Arc<Self>) -> Fallible<()>;
    async fn deactivate(self: ::std::sync::Arc<Self>) -> Fallible<()>;
}

#[async_trait]
pub trait Update<Event>: Send + Sync {
    async fn update(self: ::std::sync::Arc<Self>, event: &Event) -> Fallible<()>;
}

#[derive(::bon::Builder)]
#[builder(on(_, into))]
pub struct FetchFormatsRequestModel {
    pub url: MaybeOwnedString,
}

pub trait FetchFormatsOutputBoundary: Activate + Update<FormatsFetchedEvent> + Update<DiagnosticEvent> {}

impl<View> FetchFormatsOutputBoundary for View where View: Activate + Update<FormatsFetchedEvent> + Update<DiagnosticEvent> {}

#[derive(::bon::Builder)]
#[builder(on(_, into))]
pub struct DownloadRequestModel {
    pub url: MaybeOwnedString,

    /// `"best"` or a resolution such as `"720p"`. Ignored when `format_id` is set.
    pub quality: MaybeOwnedString,
    pub format_id: Option<MaybeOwnedString>,

    pub filename: Option<MaybeOwnedString>,
    pub directory: MaybeOwnedPath,

    pub subtitles: bool,
    pub subtitle_language: MaybeOwnedString,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,

    #[builder(default)]
    pub cancellation: ::tokio_util::sync::CancellationToken,
}

pub trait DownloadOutputBoundary: Activate + Update<DownloadEvent> + Update<DiagnosticEvent> {}

impl<View> DownloadOutputBoundary for View where View: Activate + Update<DownloadEvent> + Update<DiagnosticEvent> {}

pub struct CheckUpdatesRequestModel;

pub trait CheckUpdatesOutputBoundary: Update<VersionReport> + Update<DiagnosticEvent> {}

impl<View> CheckUpdatesOutputBoundary for View where View: Update<VersionReport> + Update<DiagnosticEvent> {}

pub struct ShowSettingsRequestModel;

/// Fields left as `None` keep their stored value.
#[derive(Default)]
pub struct UpdateSettingsRequestModel {
    pub output_directory: Option<MaybeOwnedPath>,
    pub quality: Option<MaybeOwnedString>,
    pub subtitles: Option<bool>,
    pub subtitle_language: Option<MaybeOwnedString>,
    pub embed_metadata: Option<bool>,
    pub embed_thumbnail: Option<bool>,
    pub attempts: Option<u32>,
    pub program: Option<MaybeOwnedPath>,
}

pub trait SettingsOutputBoundary: Update<Settings> {}

impl<View> SettingsOutputBoundary for View where View: Update<Settings> {}
