use ::domain::Scope;

use crate::models::errors::DownloadError;
use crate::utils::aliases::MaybeOwnedString;

/// Decides which URLs may be handed to the external tool at all.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    domains: Vec<MaybeOwnedString>,
}

impl UrlPolicy {
    pub fn new<Domains>(domains: Domains) -> Self
    where
        Domains: IntoIterator,
        Domains::Item: Into<MaybeOwnedString>,
    {
        Self { domains: domains.into_iter().map(Into::into).collect() }
    }

    pub fn validate(&self, url: &str) -> Result<Scope, DownloadError> {
        let parsed = ::url::Url::parse(url)
            .map_err(|err| DownloadError::invalid_input(format!("`{}` is not a URL: {}", url, err)))?;

        if parsed.scheme().is_empty() || parsed.cannot_be_a_base() {
            return Err(DownloadError::invalid_input(format!("`{}` has no scheme", url)));
        }

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| DownloadError::invalid_input(format!("`{}` has no host", url)))?;

        if !self.domains.iter().any(|domain| host.contains(&**domain)) {
            return Err(DownloadError::invalid_input(format!(
                "`{}` is not on a supported site ({})",
                host,
                self.domains.join(", ")
            )));
        }

        if parsed.path().starts_with("/playlist") {
            return match parsed.query_pairs().any(|(key, _)| key == "list") {
                true => Ok(Scope::Playlist),
                false => Err(DownloadError::invalid_input("playlist URL has no `list` parameter")),
            };
        }

        Ok(Scope::Video)
    }
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::new(["youtube.com", "youtu.be"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_watch_urls_as_videos() {
        let policy = UrlPolicy::default();

        assert_eq!(policy.validate("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Ok(Scope::Video));
        assert_eq!(policy.validate("https://youtu.be/dQw4w9WgXcQ"), Ok(Scope::Video));
    }

    #[test]
    fn accepts_playlist_urls_with_list_parameter() {
        let policy = UrlPolicy::default();

        assert_eq!(
            policy.validate("https://www.youtube.com/playlist?list=PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI"),
            Ok(Scope::Playlist),
        );
    }

    #[test]
    fn rejects_playlist_urls_without_list_parameter() {
        let policy = UrlPolicy::default();

        assert!(matches!(
            policy.validate("https://www.youtube.com/playlist?foo=bar"),
            Err(DownloadError::InvalidInput(_)),
        ));
    }

    #[test]
    fn rejects_urls_without_scheme_or_host() {
        let policy = UrlPolicy::default();

        assert!(matches!(policy.validate("www.youtube.com/watch?v=x"), Err(DownloadError::InvalidInput(_))));
        assert!(matches!(policy.validate("mailto:someone@youtube.com"), Err(DownloadError::InvalidInput(_))));
        assert!(matches!(policy.validate("file:///home/youtube.com"), Err(DownloadError::InvalidInput(_))));
        assert!(matches!(policy.validate(""), Err(DownloadError::InvalidInput(_))));
    }

    #[test]
    fn rejects_foreign_hosts() {
        let policy = UrlPolicy::default();

        assert!(matches!(
            policy.validate("https://vimeo.com/76979871"),
            Err(DownloadError::InvalidInput(_)),
        ));
    }

    #[test]
    fn domains_are_configurable() {
        let policy = UrlPolicy::new(["vimeo.com"]);

        assert_eq!(policy.validate("https://vimeo.com/76979871"), Ok(Scope::Video));
        assert!(policy.validate("https://www.youtube.com/watch?v=x").is_err());
    }
}
