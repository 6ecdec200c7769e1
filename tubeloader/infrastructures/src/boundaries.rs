use ::async_trait::async_trait;
use ::domain::DownloadOutcome;
use ::domain::PlaylistPosition;
use ::domain::PlaylistSummary;
use ::domain::ProgressEvent;
use ::domain::Settings;
use ::use_cases::boundaries::Activate;
use ::use_cases::boundaries::Update;
use ::use_cases::models::events::DiagnosticEvent;
use ::use_cases::models::events::DiagnosticLevel;
use ::use_cases::models::events::DownloadEvent;
use ::use_cases::models::events::DownloadStartedEvent;
use ::use_cases::models::events::FormatsFetchedEvent;
use ::use_cases::models::reports::VersionReport;

use crate::utils::aliases::Fallible;

macro_rules! lazy_progress_style {
    ($template:expr) => {
        ::once_cell::sync::Lazy::new(|| ::indicatif::ProgressStyle::with_template($template).unwrap())
    };
}

macro_rules! lazy_color {
    ($color:expr) => {
        ::once_cell::sync::Lazy::new(|| {
            use ::colored::Colorize as _;

            $color
        })
    };
}

static PROGRESS_BAR_STYLE: ::once_cell::sync::Lazy<::indicatif::ProgressStyle> =
    lazy_progress_style!("{prefix} {bar:50} {msg}");

/// Terminal rendering for every use case. Progress goes to stderr through
/// indicatif; listings and reports go to stdout.
pub struct AggregateView {
    progress_bars: ::indicatif::MultiProgress,
    download_progress_bar: ::indicatif::ProgressBar,
}

impl AggregateView {
    pub fn new() -> Self {
        let progress_bars = ::indicatif::MultiProgress::new();
        progress_bars.set_draw_target(::indicatif::ProgressDrawTarget::hidden());

        let download_progress_bar =
            progress_bars.add(::indicatif::ProgressBar::new(100).with_style(PROGRESS_BAR_STYLE.clone()));

        download_progress_bar.disable_steady_tick();
        download_progress_bar.set_prefix(format!("{:<7} {}", "", FormattedUninitEta));
        download_progress_bar.set_message(format!("{}", FormattedUninitPercentage));

        Self { progress_bars, download_progress_bar }
    }
}

#[async_trait]
impl Activate for AggregateView {
    async fn activate(self: ::std::sync::Arc<Self>) -> Fallible<()> {
        self.progress_bars.set_draw_target(::indicatif::ProgressDrawTarget::stderr());
        self.download_progress_bar.tick();

        Ok(())
    }

    async fn deactivate(self: ::std::sync::Arc<Self>) -> Fallible<()> {
        self.progress_bars.set_draw_target(::indicatif::ProgressDrawTarget::hidden());

        Ok(())
    }
}

#[async_trait]
impl Update<DownloadEvent> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &DownloadEvent) -> Fallible<()> {
        match event {
            DownloadEvent::PlaylistResolved(event) => self.update(event).await,
            DownloadEvent::Started(event) => self.update(event).await,
            DownloadEvent::ProgressUpdated(event) => self.update(event).await,
            DownloadEvent::Finished(event) => self.update(event).await,
        }
    }
}

#[async_trait]
impl Update<PlaylistSummary> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &PlaylistSummary) -> Fallible<()> {
        use ::colored::Colorize as _;

        let PlaylistSummary { title, entries } = event;

        let title = title.as_deref().map_or_else(|| NULL.clone(), |title| title.white().bold());

        self.progress_bars
            .println(format!("Downloading playlist: {} ({} videos)", title, entries))?;

        Ok(())
    }
}

#[async_trait]
impl Update<DownloadStartedEvent> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &DownloadStartedEvent) -> Fallible<()> {
        let DownloadStartedEvent { attempt, attempts } = event;

        self.download_progress_bar.reset();
        self.download_progress_bar.set_style(PROGRESS_BAR_STYLE.clone());
        self.download_progress_bar.set_prefix(format!("{:<7} {}", "", FormattedUninitEta));
        self.download_progress_bar.set_message(format!("{}", FormattedUninitPercentage));

        if *attempts > 1 {
            self.progress_bars
                .println(format!("Starting download (attempt {}/{})", attempt, attempts))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Update<ProgressEvent> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &ProgressEvent) -> Fallible<()> {
        let ProgressEvent { percentage, eta, position } = event;

        let position = position.map(FormattedPosition).map(|position| position.to_string()).unwrap_or_default();
        let eta = eta
            .as_deref()
            .map_or_else(|| FormattedUninitEta.to_string(), |eta| FormattedEta(eta).to_string());

        self.download_progress_bar.set_position(percentage.round() as u64);
        self.download_progress_bar.set_prefix(format!("{:<7} {}", position, eta));
        self.download_progress_bar
            .set_message(format!("{}", FormattedPercentage(*percentage)));

        Ok(())
    }
}

#[async_trait]
impl Update<DownloadOutcome> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &DownloadOutcome) -> Fallible<()> {
        use ::colored::Colorize as _;

        static COMPLETED_STYLE: ::once_cell::sync::Lazy<::indicatif::ProgressStyle> =
            lazy_progress_style!("{prefix} {bar:50.green} {msg}");

        let progress_bar = &self.download_progress_bar;

        match event {
            DownloadOutcome::Completed => {
                progress_bar.set_style(COMPLETED_STYLE.clone());
                progress_bar.set_position(100);
                progress_bar.set_prefix(progress_bar.prefix().green().to_string());
                progress_bar.set_message("Download completed".green().to_string());
            },

            DownloadOutcome::Cancelled => {
                progress_bar.set_prefix(progress_bar.prefix().color(GRAY).to_string());
                progress_bar.set_message("Download cancelled".yellow().to_string());
            },

            DownloadOutcome::Failed(message) => {
                progress_bar.set_prefix(progress_bar.prefix().color(GRAY).to_string());
                progress_bar.set_message("Download failed".red().to_string());
                self.progress_bars.println(format!("{}", message.red()))?;
            },
        }

        progress_bar.finish();

        Ok(())
    }
}

#[async_trait]
impl Update<DiagnosticEvent> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &DiagnosticEvent) -> Fallible<()> {
        use ::colored::Colorize as _;

        static DECOY_PROGRESS_BAR_STYLE: ::once_cell::sync::Lazy<::indicatif::ProgressStyle> =
            lazy_progress_style!("{msg}");

        let DiagnosticEvent { message, level } = event;

        let message = match level {
            DiagnosticLevel::Warning => message.yellow(),
            DiagnosticLevel::Error => message.red(),
        };

        let decoy_progress_bar = self
            .progress_bars
            .insert_before(&self.download_progress_bar, ::indicatif::ProgressBar::no_length());

        decoy_progress_bar.set_style(DECOY_PROGRESS_BAR_STYLE.clone());
        decoy_progress_bar.finish_with_message(format!("{}", message));

        Ok(())
    }
}

#[async_trait]
impl Update<FormatsFetchedEvent> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &FormatsFetchedEvent) -> Fallible<()> {
        use ::colored::Colorize as _;

        let FormatsFetchedEvent { formats } = event;

        if formats.is_empty() {
            println!("{}", "No formats found".yellow());
            return Ok(());
        }

        println!("{}", format!("{:<8} {:<6} {}", "ID", "EXT", "RESOLUTION").bold());

        for format in formats {
            println!("{:<8} {:<6} {}", format.id, format.container, format.resolution);
        }

        Ok(())
    }
}

#[async_trait]
impl Update<VersionReport> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &VersionReport) -> Fallible<()> {
        use ::colored::Colorize as _;

        match event {
            VersionReport::UpToDate { version } => {
                println!("{} ({})", "yt-dlp is up to date".green(), version);
            },

            VersionReport::UpdateAvailable { installed, latest } => {
                println!("{} {} -> {}", "Update available:".yellow().bold(), installed, latest.white().bold());
            },
        }

        Ok(())
    }
}

#[async_trait]
impl Update<Settings> for AggregateView {
    async fn update(self: ::std::sync::Arc<Self>, event: &Settings) -> Fallible<()> {
        use ::colored::Colorize as _;

        let rows: [(&str, String); 10] = [
            ("output_directory", event.output_directory.display().to_string()),
            ("quality", event.quality.to_string()),
            ("subtitles", event.subtitles.to_string()),
            ("subtitle_language", event.subtitle_language.to_string()),
            ("embed_metadata", event.embed_metadata.to_string()),
            ("embed_thumbnail", event.embed_thumbnail.to_string()),
            ("attempts", event.attempts.to_string()),
            ("program", event.program.display().to_string()),
            ("domains", event.domains.join(", ")),
            ("log_directory", event.log_directory.display().to_string()),
        ];

        for (key, value) in rows {
            println!("{:<18} {}", key.color(GRAY), value);
        }

        Ok(())
    }
}

static NULL: ::once_cell::sync::Lazy<::colored::ColoredString> = lazy_color!("N/A".yellow().bold());

const GRAY: ::colored::Color = ::colored::Color::TrueColor { r: 150, g: 150, b: 150 };

struct FormattedPercentage(f64);

impl ::std::fmt::Display for FormattedPercentage {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(formatter, "{:>5.1}%", self.0)
    }
}

struct FormattedUninitPercentage;

impl ::std::fmt::Display for FormattedUninitPercentage {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(formatter, "{:>5}%", "??")
    }
}

struct FormattedEta<'a>(&'a str);

impl ::std::fmt::Display for FormattedEta<'_> {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(formatter, "ETA {:>8}", self.0)
    }
}

struct FormattedUninitEta;

impl ::std::fmt::Display for FormattedUninitEta {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(formatter, "ETA {:>8}", "??:??")
    }
}

struct FormattedPosition(PlaylistPosition);

impl ::std::fmt::Display for FormattedPosition {
    fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(formatter, "[{}/{}]", self.0.index, self.0.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_are_padded() {
        assert_eq!(FormattedPercentage(45.2).to_string(), " 45.2%");
        assert_eq!(FormattedPercentage(100.0).to_string(), "100.0%");
        assert_eq!(FormattedUninitPercentage.to_string(), "   ??%");
    }

    #[test]
    fn eta_and_position_render_verbatim() {
        assert_eq!(FormattedEta("00:10").to_string(), "ETA    00:10");
        assert_eq!(FormattedPosition(PlaylistPosition { index: 2, total: 5 }).to_string(), "[2/5]");
    }
}
