pub(crate) mod utils;

use crate::utils::aliases::MaybeOwnedPath;
use crate::utils::aliases::MaybeOwnedString;
use crate::utils::aliases::MaybeOwnedVec;

/// Everything needed for one run of the external downloader. Built once per
/// submission and consumed by that run.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: MaybeOwnedString,
    pub scope: Scope,

    pub quality: Quality,
    pub filename: Option<MaybeOwnedString>,
    pub directory: MaybeOwnedPath,

    pub subtitles: bool,
    pub subtitle_language: MaybeOwnedString,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Video,
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quality {
    Best,
    Resolution(MaybeOwnedString),
    Format(FormatEntry),
}

impl Quality {
    /// Upper bound on the video height requested by [`Quality::Resolution`].
    /// Accepts `"720p"`, `"720"` and `"1280x720"`.
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::Resolution(resolution) => {
                let resolution = resolution.trim();
                let resolution = resolution
                    .rsplit_once(['x', 'X'])
                    .map_or(resolution, |(_, height)| height);
                let resolution = resolution.strip_suffix(['p', 'P']).unwrap_or(resolution);

                resolution.parse().ok().filter(|height| *height > 0)
            },

            _ => None,
        }
    }
}

impl ::std::str::FromStr for Quality {
    type Err = ::std::convert::Infallible;

    fn from_str(quality: &str) -> Result<Self, Self::Err> {
        let quality = quality.trim();

        Ok(match quality.to_ascii_lowercase().as_str() {
            "" | "best" | "best available" => Self::Best,
            _ => Self::Resolution(quality.to_owned().into()),
        })
    }
}

impl ::std::fmt::Display for Quality {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        match self {
            Self::Best => write!(formatter, "best"),
            Self::Resolution(resolution) => write!(formatter, "{}", resolution),
            Self::Format(format) => write!(formatter, "{} ({} {})", format.id, format.resolution, format.container),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatEntry {
    pub id: MaybeOwnedString,
    pub container: MaybeOwnedString,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Dimensions { width: u32, height: u32 },
    AudioOnly,
}

impl ::std::fmt::Display for Resolution {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        match self {
            Self::Dimensions { width, height } => write!(formatter, "{}x{}", width, height),
            Self::AudioOnly => write!(formatter, "audio only"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Always within `0.0..=100.0`.
    pub percentage: f64,
    /// Verbatim from the tool.
    pub eta: Option<MaybeOwnedString>,
    pub position: Option<PlaylistPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistPosition {
    pub index: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    Cancelled,
    Failed(MaybeOwnedString),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub title: Option<MaybeOwnedString>,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_directory: MaybeOwnedPath,
    pub quality: MaybeOwnedString,

    pub subtitles: bool,
    pub subtitle_language: MaybeOwnedString,
    pub embed_metadata: bool,
    pub embed_thumbnail: bool,

    pub attempts: u32,

    pub program: MaybeOwnedPath,
    pub domains: MaybeOwnedVec<MaybeOwnedString>,
    pub log_directory: MaybeOwnedPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_accepts_common_spellings() {
        assert_eq!(Quality::Resolution("720p".into()).height(), Some(720));
        assert_eq!(Quality::Resolution("1080".into()).height(), Some(1080));
        assert_eq!(Quality::Resolution("1920x1080".into()).height(), Some(1080));
        assert_eq!(Quality::Resolution(" 480P ".into()).height(), Some(480));
    }

    #[test]
    fn height_rejects_garbage() {
        assert_eq!(Quality::Resolution("hd".into()).height(), None);
        assert_eq!(Quality::Resolution("0p".into()).height(), None);
        assert_eq!(Quality::Best.height(), None);
    }

    #[test]
    fn best_is_parsed_case_insensitively() {
        assert_eq!("Best available".parse::<Quality>(), Ok(Quality::Best));
        assert_eq!("BEST".parse::<Quality>(), Ok(Quality::Best));
        assert_eq!("".parse::<Quality>(), Ok(Quality::Best));
        assert_eq!("720p".parse::<Quality>(), Ok(Quality::Resolution("720p".into())));
    }

    #[test]
    fn audio_only_displays_like_the_tool() {
        assert_eq!(Resolution::AudioOnly.to_string(), "audio only");
        assert_eq!(Resolution::Dimensions { width: 1280, height: 720 }.to_string(), "1280x720");
    }
}
