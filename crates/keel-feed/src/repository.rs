//! Package feed abstraction: URL layout, source ordering, configuration.

use keel_core::project::FeedEntry;

/// Default stable feed.
pub const DEFAULT_FEED_URL: &str = "https://packages.keel.build/feeds/stable";

/// A configured package feed with optional credentials.
///
/// Feed order is significant: the caller-supplied declaration order breaks
/// ties between sources offering the same version.
#[derive(Debug, Clone)]
pub struct PackageFeed {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl PackageFeed {
    /// Build a `PackageFeed` from a name and a manifest `FeedEntry`.
    pub fn from_entry(name: &str, entry: &FeedEntry) -> Self {
        match entry {
            FeedEntry::Url(url) => Self {
                name: name.to_string(),
                url: url.trim_end_matches('/').to_string(),
                username: None,
                password: None,
            },
            FeedEntry::Detailed {
                url,
                username,
                password,
            } => Self {
                name: name.to_string(),
                url: url.trim_end_matches('/').to_string(),
                username: username.clone(),
                password: password.clone(),
            },
        }
    }

    /// The default stable feed.
    pub fn default_feed() -> Self {
        Self {
            name: "stable".to_string(),
            url: DEFAULT_FEED_URL.to_string(),
            username: None,
            password: None,
        }
    }

    /// Canonical archive file name for a package.
    pub fn archive_name(name: &str, version: &str) -> String {
        format!("{name}.{version}.pkg")
    }

    /// URL to the version index for a package name.
    pub fn index_url(&self, name: &str) -> String {
        format!("{}/{}/index.xml", self.url, name)
    }

    /// URL to a specific file within a package's version directory.
    pub fn file_url(&self, name: &str, version: &str, filename: &str) -> String {
        format!("{}/{}/{}/{}", self.url, name, version, filename)
    }

    /// URL to the package archive.
    pub fn archive_url(&self, name: &str, version: &str) -> String {
        self.file_url(name, version, &Self::archive_name(name, version))
    }

    /// URL to the package manifest.
    pub fn manifest_url(&self, name: &str, version: &str) -> String {
        self.file_url(name, version, &format!("{name}.pkgspec"))
    }

    /// Whether this feed has authentication configured.
    pub fn has_auth(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }
}

/// Build the ordered feed list from manifest entries, appending the default
/// feed when none is configured.
pub fn build_feeds(entries: &std::collections::BTreeMap<String, FeedEntry>) -> Vec<PackageFeed> {
    let mut feeds: Vec<PackageFeed> = entries
        .iter()
        .map(|(name, entry)| PackageFeed::from_entry(name, entry))
        .collect();
    if feeds.is_empty() {
        feeds.push(PackageFeed::default_feed());
    }
    feeds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_format() {
        let feed = PackageFeed::default_feed();
        let url = feed.archive_url("PackageA", "1.0.0");
        assert_eq!(
            url,
            "https://packages.keel.build/feeds/stable/PackageA/1.0.0/PackageA.1.0.0.pkg"
        );
    }

    #[test]
    fn index_url_format() {
        let feed = PackageFeed::default_feed();
        assert_eq!(
            feed.index_url("PackageA"),
            "https://packages.keel.build/feeds/stable/PackageA/index.xml"
        );
    }

    #[test]
    fn from_entry_trims_trailing_slash() {
        let entry = FeedEntry::Url("https://feed.example.com/packages/".to_string());
        let feed = PackageFeed::from_entry("internal", &entry);
        assert_eq!(feed.url, "https://feed.example.com/packages");
        assert!(!feed.has_auth());
    }

    #[test]
    fn from_entry_detailed_with_auth() {
        let entry = FeedEntry::Detailed {
            url: "https://nexus.example.com/feed".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };
        let feed = PackageFeed::from_entry("nexus", &entry);
        assert!(feed.has_auth());
        assert_eq!(feed.username.as_deref(), Some("user"));
    }

    #[test]
    fn build_feeds_defaults_when_empty() {
        let feeds = build_feeds(&std::collections::BTreeMap::new());
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, DEFAULT_FEED_URL);
    }
}
