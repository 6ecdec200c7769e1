pub mod events {
    use ::domain::DownloadOutcome;
    use ::domain::FormatEntry;
    use ::domain::PlaylistSummary;
    use ::domain::ProgressEvent;

    use crate::utils::aliases::MaybeOwnedString;

    #[derive(Debug, Clone, PartialEq)]
    pub enum DownloadEvent {
        PlaylistResolved(PlaylistSummary),
        Started(DownloadStartedEvent),
        ProgressUpdated(ProgressEvent),
        Finished(DownloadOutcome),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DownloadStartedEvent {
        pub attempt: u32,
        pub attempts: u32,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FormatsFetchedEvent {
        pub formats: Vec<FormatEntry>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct DiagnosticEvent {
        pub level: DiagnosticLevel,
        pub message: MaybeOwnedString,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DiagnosticLevel {
        Warning,
        Error,
    }
}

pub mod reports {
    use crate::utils::aliases::MaybeOwnedString;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum VersionReport {
        UpToDate { version: MaybeOwnedString },
        UpdateAvailable { installed: MaybeOwnedString, latest: MaybeOwnedString },
    }

    impl VersionReport {
        pub fn compare(installed: MaybeOwnedString, latest: MaybeOwnedString) -> Self {
            if installed.trim() == latest.trim() {
                Self::UpToDate { version: installed }
            } else {
                Self::UpdateAvailable { installed, latest }
            }
        }
    }
}

pub mod errors {
    use crate::utils::aliases::MaybeOwnedString;

    /// Failures surfaced to the user. Cancellation is not one of them; it is
    /// reported as [`domain::DownloadOutcome::Cancelled`].
    #[derive(Debug, Clone, PartialEq, Eq, ::thiserror::Error)]
    pub enum DownloadError {
        #[error("invalid input: {0}")]
        InvalidInput(MaybeOwnedString),

        #[error("could not run the downloader: {0}")]
        ToolInvocation(MaybeOwnedString),

        #[error("download failed: {0}")]
        DownloadFailure(MaybeOwnedString),

        #[error("a download is already in progress")]
        Busy,
    }

    impl DownloadError {
        pub fn invalid_input(message: impl Into<MaybeOwnedString>) -> Self {
            Self::InvalidInput(message.into())
        }

        pub fn tool_invocation(message: impl Into<MaybeOwnedString>) -> Self {
            Self::ToolInvocation(message.into())
        }
    }
}
