//! Line-oriented readers for yt-dlp output. Everything here is pure and is
//! pinned by tests against literal lines captured from the tool.

use ::domain::FormatEntry;
use ::domain::PlaylistPosition;
use ::domain::PlaylistSummary;
use ::domain::ProgressEvent;
use ::domain::Resolution;
use ::use_cases::models::events::DiagnosticEvent;
use ::use_cases::models::events::DiagnosticLevel;

use crate::utils::aliases::Fallible;

macro_rules! lazy_regex {
    ($pattern:expr) => {
        ::once_cell::sync::Lazy::new(|| ::regex::Regex::new($pattern).unwrap())
    };
}

static FORMAT_LINE: ::once_cell::sync::Lazy<::regex::Regex> =
    lazy_regex!(r"^\s*(\S+)\s+(\w+)\s+(\d+x\d+|audio only)");

static PLAYLIST_POSITION: ::once_cell::sync::Lazy<::regex::Regex> =
    lazy_regex!(r"Downloading (?:video|item) (\d+) of (\d+)");

static PERCENTAGE: ::once_cell::sync::Lazy<::regex::Regex> =
    lazy_regex!(r"^\[download\]\s+(\d+(?:\.\d+)?)%");

static ETA: ::once_cell::sync::Lazy<::regex::Regex> = lazy_regex!(r"ETA (\S+)");

pub(crate) trait FromYtdlpLine: ::core::marker::Send + ::core::marker::Sync {
    fn from_line<Line>(line: Line) -> Option<Self>
    where
        Line: AsRef<str>,
        Self: Sized;
}

impl FromYtdlpLine for FormatEntry {
    fn from_line<Line>(line: Line) -> Option<Self>
    where
        Line: AsRef<str>,
        Self: Sized,
    {
        let captures = FORMAT_LINE.captures(line.as_ref())?;

        let resolution = match &captures[3] {
            "audio only" => Resolution::AudioOnly,
            dimensions => {
                let (width, height) = dimensions.split_once('x')?;
                Resolution::Dimensions { width: width.parse().ok()?, height: height.parse().ok()? }
            },
        };

        Some(Self {
            id: captures[1].to_owned().into(),
            container: captures[2].to_owned().into(),
            resolution,
        })
    }
}

impl FromYtdlpLine for DiagnosticEvent {
    fn from_line<Line>(line: Line) -> Option<Self>
    where
        Line: AsRef<str>,
        Self: Sized,
    {
        let (level, message) = line.as_ref().split_once(':')?;

        let level = match level.trim() {
            "WARNING" => DiagnosticLevel::Warning,
            "ERROR" => DiagnosticLevel::Error,
            _ => return None,
        };

        Some(Self { level, message: message.trim().to_owned().into() })
    }
}

/// Keeps the first entry for every `(resolution, container)` pair, in the
/// order the tool printed them.
pub fn parse_format_listing<Lines, Line>(lines: Lines) -> Vec<FormatEntry>
where
    Lines: IntoIterator<Item = Line>,
    Line: AsRef<str>,
{
    let mut seen = ::std::collections::HashSet::new();

    lines
        .into_iter()
        .filter_map(FormatEntry::from_line)
        .filter(|format| seen.insert((format.resolution, format.container.clone())))
        .collect()
}

/// Remembers the most recent playlist position marker and stamps it onto the
/// progress lines that follow.
#[derive(Debug, Default)]
pub struct ProgressParser {
    position: Option<PlaylistPosition>,
}

impl ProgressParser {
    pub fn parse(&mut self, line: &str) -> Option<ProgressEvent> {
        if let Some(captures) = PLAYLIST_POSITION.captures(line) {
            self.position = Some(PlaylistPosition { index: captures[1].parse().ok()?, total: captures[2].parse().ok()? });
            return None;
        }

        let percentage: f64 = PERCENTAGE.captures(line)?[1].parse().ok()?;

        let eta = ETA
            .captures(line)
            .map(|captures| captures[1].to_owned())
            .filter(|eta| !matches!(eta.as_str(), "Unknown" | "NA"))
            .map(Into::into);

        Some(ProgressEvent { percentage: percentage.clamp(0.0, 100.0), eta, position: self.position })
    }
}

#[derive(::serde::Deserialize)]
struct FlatPlaylistEntry {
    playlist_title: Option<String>,
    playlist: Option<String>,
}

/// Reads the output of `--flat-playlist --dump-json`, one JSON object per entry.
pub fn parse_playlist_summary<Lines, Line>(lines: Lines) -> Fallible<PlaylistSummary>
where
    Lines: IntoIterator<Item = Line>,
    Line: AsRef<str>,
{
    let mut title = None;
    let mut entries = 0;

    for line in lines {
        let line = line.as_ref().trim();

        if line.is_empty() {
            continue;
        }

        let entry: FlatPlaylistEntry = ::serde_json::from_str(line)?;

        if entries == 0 {
            title = entry.playlist_title.or(entry.playlist).map(Into::into);
        }

        entries += 1;
    }

    Ok(PlaylistSummary { title, entries })
}
