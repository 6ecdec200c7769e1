use ::async_trait::async_trait;
use ::domain::Settings;
use ::use_cases::gateways::SettingsRepository;

use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedPath;
use crate::utils::aliases::MaybeOwnedString;

const QUALIFIER: &str = "";
const ORGANIZATION: &str = "";
const APPLICATION: &str = "tubeloader";

/// Settings stored as one JSON document. Keys missing from the file keep
/// their default.
#[derive(::bon::Builder)]
#[builder(on(_, into))]
pub struct JsonSettingsRepository {
    path: MaybeOwnedPath,

    #[builder(default = default_settings())]
    defaults: Settings,
}

#[async_trait]
impl SettingsRepository for JsonSettingsRepository {
    async fn load(self: ::std::sync::Arc<Self>) -> Fallible<Settings> {
        let content = match ::tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ::std::io::ErrorKind::NotFound => {
                ::tracing::debug!(path = %self.path.display(), "no settings file, using defaults");

                return Ok(self.defaults.clone());
            },
            Err(err) => return Err(err.into()),
        };

        let document: SettingsDocument = ::serde_json::from_str(&content)
            .map_err(|err| ::anyhow::anyhow!("malformed settings file {}: {}", self.path.display(), err))?;

        Ok(document.merge_into(self.defaults.clone()))
    }

    async fn save(self: ::std::sync::Arc<Self>, settings: &Settings) -> Fallible<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ::tokio::fs::create_dir_all(parent).await?;
        }

        let content = ::serde_json::to_string_pretty(&SettingsDocument::from(settings))?;
        ::tokio::fs::write(&self.path, content).await?;

        ::tracing::debug!(path = %self.path.display(), "settings written");

        Ok(())
    }
}

#[derive(Default, ::serde::Serialize, ::serde::Deserialize)]
#[serde(default)]
struct SettingsDocument {
    output_directory: Option<::std::path::PathBuf>,
    quality: Option<String>,
    subtitles: Option<bool>,
    subtitle_language: Option<String>,
    embed_metadata: Option<bool>,
    embed_thumbnail: Option<bool>,
    attempts: Option<u32>,
    program: Option<::std::path::PathBuf>,
    domains: Option<Vec<String>>,
    log_directory: Option<::std::path::PathBuf>,
}

impl SettingsDocument {
    fn merge_into(self, mut settings: Settings) -> Settings {
        if let Some(output_directory) = self.output_directory {
            settings.output_directory = output_directory.into();
        }
        if let Some(quality) = self.quality {
            settings.quality = quality.into();
        }
        if let Some(subtitles) = self.subtitles {
            settings.subtitles = subtitles;
        }
        if let Some(subtitle_language) = self.subtitle_language {
            settings.subtitle_language = subtitle_language.into();
        }
        if let Some(embed_metadata) = self.embed_metadata {
            settings.embed_metadata = embed_metadata;
        }
        if let Some(embed_thumbnail) = self.embed_thumbnail {
            settings.embed_thumbnail = embed_thumbnail;
        }
        if let Some(attempts) = self.attempts.filter(|attempts| *attempts > 0) {
            settings.attempts = attempts;
        }
        if let Some(program) = self.program {
            settings.program = program.into();
        }
        if let Some(domains) = self.domains.filter(|domains| !domains.is_empty()) {
            settings.domains = domains.into_iter().map(MaybeOwnedString::from).collect::<Vec<_>>().into();
        }
        if let Some(log_directory) = self.log_directory {
            settings.log_directory = log_directory.into();
        }

        settings
    }
}

impl From<&Settings> for SettingsDocument {
    fn from(settings: &Settings) -> Self {
        Self {
            output_directory: Some(settings.output_directory.to_path_buf()),
            quality: Some(settings.quality.to_string()),
            subtitles: Some(settings.subtitles),
            subtitle_language: Some(settings.subtitle_language.to_string()),
            embed_metadata: Some(settings.embed_metadata),
            embed_thumbnail: Some(settings.embed_thumbnail),
            attempts: Some(settings.attempts),
            program: Some(settings.program.to_path_buf()),
            domains: Some(settings.domains.iter().map(ToString::to_string).collect()),
            log_directory: Some(settings.log_directory.to_path_buf()),
        }
    }
}

fn project_directories() -> Option<::directories::ProjectDirs> {
    ::directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

pub fn default_settings_path() -> Fallible<::std::path::PathBuf> {
    let directories = project_directories().ok_or_else(|| ::anyhow::anyhow!("could not determine the config directory"))?;

    Ok(directories.config_dir().join("config.json"))
}

pub fn default_settings() -> Settings {
    let output_directory = ::directories::UserDirs::new()
        .and_then(|directories| {
            directories
                .download_dir()
                .map(::std::path::Path::to_path_buf)
                .or_else(|| Some(directories.home_dir().join("Downloads")))
        })
        .unwrap_or_default()
        .join("YouTubeDownloader");

    let log_directory = project_directories()
        .map(|directories| directories.data_local_dir().join("logs"))
        .unwrap_or_else(|| ::std::path::PathBuf::from("logs"));

    Settings {
        output_directory: output_directory.into(),
        quality: "best".into(),
        subtitles: false,
        subtitle_language: "en".into(),
        embed_metadata: false,
        embed_thumbnail: false,
        attempts: 3,
        program: ::std::borrow::Cow::Borrowed(::std::path::Path::new("yt-dlp")),
        domains: ::std::borrow::Cow::Owned(vec![MaybeOwnedString::Borrowed("youtube.com"), MaybeOwnedString::Borrowed("youtu.be")]),
        log_directory: log_directory.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository(path: ::std::path::PathBuf) -> ::std::sync::Arc<JsonSettingsRepository> {
        ::std::sync::Arc::new(JsonSettingsRepository::builder().path(path).build())
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let directory = ::tempfile::tempdir().unwrap();

        let settings = repository(directory.path().join("config.json")).load().await.unwrap();

        assert_eq!(settings, default_settings());
        assert_eq!(settings.attempts, 3);
    }

    #[tokio::test]
    async fn saved_settings_load_back() {
        let directory = ::tempfile::tempdir().unwrap();
        let repository = repository(directory.path().join("nested").join("config.json"));

        let mut settings = default_settings();
        settings.quality = "1080p".into();
        settings.subtitles = true;
        settings.subtitle_language = "fr".into();
        settings.attempts = 5;

        ::std::sync::Arc::clone(&repository).save(&settings).await.unwrap();

        assert_eq!(repository.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn partial_document_keeps_other_defaults() {
        let directory = ::tempfile::tempdir().unwrap();
        let path = directory.path().join("config.json");
        ::tokio::fs::write(&path, r#"{ "quality": "720p", "embed_thumbnail": true }"#).await.unwrap();

        let settings = repository(path).load().await.unwrap();

        assert_eq!(settings.quality, "720p");
        assert!(settings.embed_thumbnail);
        assert_eq!(settings.subtitle_language, "en");
        assert_eq!(settings.attempts, 3);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let directory = ::tempfile::tempdir().unwrap();
        let path = directory.path().join("config.json");
        ::tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(repository(path).load().await.is_err());
    }
}
