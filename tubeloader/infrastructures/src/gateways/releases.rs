use ::async_trait::async_trait;
use ::use_cases::gateways::VersionSource;

use crate::utils::aliases::Fallible;
use crate::utils::aliases::MaybeOwnedString;

/// Latest published release of a GitHub repository, e.g. `yt-dlp/yt-dlp`.
#[derive(::derive_new::new)]
pub struct GithubReleaseChecker {
    #[new(into)]
    repository: MaybeOwnedString,

    #[new(default)]
    client: ::reqwest::Client,
}

#[derive(::serde::Deserialize)]
struct Release {
    tag_name: String,
}

#[async_trait]
impl VersionSource for GithubReleaseChecker {
    async fn version(self: ::std::sync::Arc<Self>) -> Fallible<MaybeOwnedString> {
        let url = format!("https://api.github.com/repos/{}/releases/latest", self.repository);

        ::tracing::debug!(%url, "fetching latest release");

        let release: Release = self
            .client
            .get(&url)
            .header(::reqwest::header::USER_AGENT, concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .header(::reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(release.tag_name.trim().to_owned().into())
    }
}
