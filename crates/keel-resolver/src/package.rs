//! Package provider: resolves package ranges against the installed cache
//! and the ordered remote feeds.
//!
//! Feed queries for one range fan out concurrently and join before
//! returning; the merge is deterministic (maximum satisfying version, ties
//! broken by source declaration order, the installed cache ranking first).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use keel_core::framework::TargetFramework;
use keel_core::library::{
    Library, LibraryDependency, LibraryIdentity, LibraryKind, LibraryRange,
};
use keel_core::version::{Version, VersionConstraint};
use keel_feed::cache::PackageCache;
use keel_feed::download;
use keel_feed::index::{self, FeedIndex};
use keel_feed::manifest::{self, PackageManifest};
use keel_feed::repository::PackageFeed;
use keel_util::errors::KeelError;

use crate::provider::{kind_permitted, DependencyProvider};

const MAX_CONCURRENT_FETCHES: usize = 8;

/// Behavior switches handed down from the environment by the caller.
#[derive(Debug, Clone)]
pub struct PackageProviderOptions {
    /// Never consult the installed cache during resolution.
    pub no_cache: bool,
    /// Keep resolving when a source is unreachable, as long as some source
    /// still satisfies the range.
    pub ignore_failed_sources: bool,
    /// Source-level timeout; an overrun counts as a failed source.
    pub feed_timeout: Duration,
}

impl Default for PackageProviderOptions {
    fn default() -> Self {
        Self {
            no_cache: false,
            ignore_failed_sources: false,
            feed_timeout: Duration::from_secs(30),
        }
    }
}

/// Resolves package ranges from the shared cache and configured feeds.
pub struct PackageProvider {
    feeds: Vec<PackageFeed>,
    cache: PackageCache,
    client: Client,
    options: PackageProviderOptions,
}

/// Where a winning candidate came from: rank 0 is the installed cache,
/// rank N is the Nth configured feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceRank(usize);

impl PackageProvider {
    pub fn new(
        feeds: Vec<PackageFeed>,
        cache: PackageCache,
        client: Client,
        options: PackageProviderOptions,
    ) -> Self {
        Self {
            feeds,
            cache,
            client,
            options,
        }
    }

    /// Query every feed's version index concurrently, each under the
    /// source-level timeout. Results come back in feed declaration order.
    async fn query_feeds(&self, name: &str) -> Vec<miette::Result<Option<FeedIndex>>> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
        let mut join_set = JoinSet::new();
        for (i, feed) in self.feeds.iter().enumerate() {
            let client = self.client.clone();
            let feed = feed.clone();
            let name = name.to_string();
            let timeout = self.options.feed_timeout;
            let sem = semaphore.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let outcome =
                    tokio::time::timeout(timeout, fetch_index(&client, &feed, &name)).await;
                let outcome = match outcome {
                    Ok(result) => result,
                    Err(_) => Err(KeelError::Network {
                        message: format!("Source '{}' timed out after {timeout:?}", feed.name),
                    }
                    .into()),
                };
                (i, outcome)
            });
        }

        let mut results: Vec<miette::Result<Option<FeedIndex>>> =
            (0..self.feeds.len()).map(|_| Ok(None)).collect();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((i, outcome)) = joined {
                results[i] = outcome;
            }
        }
        results
    }

    /// Load the chosen version's manifest: from the cache when installed,
    /// otherwise from the feeds in order.
    async fn load_manifest(
        &self,
        name: &str,
        version: &Version,
        rank: SourceRank,
    ) -> Option<PackageManifest> {
        let version_str = version.to_string();
        if let Some(found) = self.cache.get_manifest(name, &version_str) {
            return Some(found);
        }

        // Start at the winning source, then fall back to the others
        let mut order: Vec<&PackageFeed> = Vec::new();
        if rank.0 > 0 {
            order.push(&self.feeds[rank.0 - 1]);
        }
        for (i, feed) in self.feeds.iter().enumerate() {
            if i + 1 != rank.0 {
                order.push(feed);
            }
        }

        for feed in order {
            let url = feed.manifest_url(name, &version_str);
            match download::download_text(&self.client, feed, &url).await {
                Ok(Some(xml)) => match manifest::parse_manifest(&xml) {
                    Ok(parsed) => return Some(parsed),
                    Err(e) => {
                        tracing::warn!("Malformed manifest at {url}: {e}");
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Failed to fetch manifest from '{}': {e}", feed.name);
                }
            }
        }
        None
    }
}

async fn fetch_index(
    client: &Client,
    feed: &PackageFeed,
    name: &str,
) -> miette::Result<Option<FeedIndex>> {
    let url = feed.index_url(name);
    match download::download_text(client, feed, &url).await? {
        Some(xml) => Ok(Some(index::parse_index(&xml)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl DependencyProvider for PackageProvider {
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool {
        kind_permitted(kinds, LibraryKind::Package)
    }

    async fn resolve(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> miette::Result<Option<Library>> {
        let mut candidates: Vec<(Version, SourceRank)> = Vec::new();

        if !self.options.no_cache {
            if let Some(version) = self.cache.best_installed(&range.name, &range.constraint) {
                candidates.push((version, SourceRank(0)));
            }
        }

        let mut failed: Vec<String> = Vec::new();
        if !self.feeds.is_empty() {
            for (i, outcome) in self.query_feeds(&range.name).await.into_iter().enumerate() {
                match outcome {
                    Ok(Some(feed_index)) => {
                        if let Some(version) = feed_index.best_match(&range.constraint) {
                            candidates.push((version, SourceRank(i + 1)));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        failed.push(format!("{}: {e}", self.feeds[i].name));
                    }
                }
            }
        }

        // Maximum satisfying version; equal versions go to the earliest
        // source so repeated runs pick identically
        let best = candidates
            .into_iter()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1 .0.cmp(&a.1 .0)));

        if !failed.is_empty() {
            if !self.options.ignore_failed_sources || best.is_none() {
                return Err(KeelError::Network {
                    message: format!(
                        "Source(s) failed while resolving {}: {}",
                        range.name,
                        failed.join("; ")
                    ),
                }
                .into());
            }
            for failure in &failed {
                tracing::warn!("Ignoring failed source while resolving {}: {failure}", range.name);
            }
        }

        let (version, rank) = match best {
            Some(found) => found,
            None => return Ok(None),
        };

        let manifest = self.load_manifest(&range.name, &version, rank).await;
        if manifest.is_none() {
            tracing::warn!(
                "No manifest available for {} {version}; treating as dependency-free",
                range.name
            );
        }

        let canonical_name = manifest
            .as_ref()
            .and_then(|m| m.id.clone())
            .unwrap_or_else(|| range.name.clone());

        let dependencies = match &manifest {
            Some(m) => manifest_dependencies(m, framework)?,
            None => Vec::new(),
        };

        let path = self.cache.installed_dir(&range.name, &version.to_string());

        Ok(Some(Library {
            range: range.clone(),
            identity: LibraryIdentity::new(canonical_name, version, LibraryKind::Package),
            dependencies,
            resolved: true,
            path,
        }))
    }
}

/// Convert a manifest's per-framework dependency group into walker edges.
fn manifest_dependencies(
    manifest: &PackageManifest,
    framework: &TargetFramework,
) -> miette::Result<Vec<LibraryDependency>> {
    let mut edges = Vec::new();
    for dep in manifest.dependencies_for(framework) {
        let constraint = match &dep.version {
            Some(spec) => VersionConstraint::parse(spec).ok_or_else(|| KeelError::Resolution {
                message: format!(
                    "Package '{}' declares invalid constraint '{spec}' for '{}'",
                    manifest.id.as_deref().unwrap_or("?"),
                    dep.id
                ),
            })?,
            None => VersionConstraint {
                min: None,
                max: None,
                floating: false,
            },
        };
        edges.push(LibraryDependency::new(LibraryRange::any(
            dep.id.clone(),
            constraint,
        )));
    }
    Ok(edges)
}
