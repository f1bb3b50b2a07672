//! Operation: restore a project — resolve its dependency closure, acquire
//! missing packages, and persist the lock snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use keel_core::library::{LibraryKind, LibraryRange};
use keel_core::project::{ProjectManifest, WorkspaceProjects, MANIFEST_FILENAME};
use keel_core::snapshot::{LockLibrary, LockSnapshot, SNAPSHOT_FILENAME};
use keel_core::version::{Version, VersionConstraint};
use keel_feed::cache::PackageCache;
use keel_feed::download;
use keel_feed::install::{self, InstallOutcome};
use keel_feed::repository::build_feeds;
use keel_resolver::conflict::{resolve_conflicts, ResolvedSet, UnresolvedLibrary};
use keel_resolver::package::{PackageProvider, PackageProviderOptions};
use keel_resolver::platform::{MachineAssemblyProvider, ReferenceAssemblyProvider};
use keel_resolver::project::ProjectReferenceProvider;
use keel_resolver::provider::DependencyProvider;
use keel_resolver::walker::DependencyWalker;
use keel_util::errors::KeelError;
use keel_util::progress::{spinner, status, status_warn};

use crate::assets;

/// Environment-driven configuration, handed down already parsed by the
/// tool surface.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Shared package directory override; defaults to `.keel/packages`
    /// under the project root.
    pub packages_dir: Option<PathBuf>,
    /// Proxy address for feed traffic.
    pub proxy: Option<String>,
    /// Never consult the installed cache during resolution.
    pub no_cache: bool,
    /// Tolerate unreachable sources when another source still satisfies.
    pub ignore_failed_sources: bool,
    /// Source-level feed timeout.
    pub feed_timeout: Duration,
    /// Redistributable list for the reference-assembly provider.
    pub redist_list: Option<PathBuf>,
    /// Machine-wide assembly registry roots.
    pub machine_assembly_roots: Vec<PathBuf>,
    /// Write the snapshot with `locked = true`, pinning exact versions.
    pub lock: bool,
    pub verbose: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            packages_dir: None,
            proxy: None,
            no_cache: false,
            ignore_failed_sources: false,
            feed_timeout: Duration::from_secs(30),
            redist_list: None,
            machine_assembly_roots: Vec::new(),
            lock: false,
            verbose: false,
        }
    }
}

/// What a restore did.
#[derive(Debug)]
pub struct RestoreSummary {
    pub frameworks: Vec<String>,
    /// Accepted libraries across all frameworks (root excluded).
    pub accepted: usize,
    pub installed: u32,
    pub up_to_date: u32,
    /// Every unsatisfied request, reported together rather than aborting
    /// at the first failure.
    pub unresolved: Vec<UnresolvedLibrary>,
    pub snapshot_written: bool,
    pub skipped_resolution: bool,
}

impl RestoreSummary {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Restore the project rooted at `project_root`.
pub async fn restore(project_root: &Path, options: &RestoreOptions) -> miette::Result<RestoreSummary> {
    let manifest = ProjectManifest::from_path(&project_root.join(MANIFEST_FILENAME))?;
    let groups = manifest.dependency_groups()?;

    let cache_root = options
        .packages_dir
        .clone()
        .unwrap_or_else(|| project_root.join(".keel").join("packages"));
    let cache = PackageCache::new(cache_root);
    let feeds = build_feeds(&manifest.feeds);
    let client = download::build_client(options.proxy.as_deref())?;

    let snapshot_path = project_root.join(SNAPSHOT_FILENAME);
    let existing = snapshot_path
        .is_file()
        .then(|| LockSnapshot::from_path(&snapshot_path).ok())
        .flatten();

    // Locked fast path: trust the snapshot as-is, only acquiring what is
    // missing from the cache
    if let Some(snapshot) = existing
        .as_ref()
        .filter(|s| s.can_skip_resolution(&groups))
    {
        let mut installed = 0u32;
        let mut up_to_date = 0u32;
        for (name, version, _) in snapshot.library_entries() {
            match install::ensure_installed(&cache, &feeds, &client, name, version).await? {
                InstallOutcome::Installed => installed += 1,
                InstallOutcome::AlreadyInstalled => up_to_date += 1,
            }
        }
        status(
            "Restored",
            &format!(
                "{} libraries from the lock snapshot ({installed} installed, {up_to_date} up-to-date)",
                snapshot.libraries.len()
            ),
        );
        return Ok(RestoreSummary {
            frameworks: snapshot.targets.keys().cloned().collect(),
            accepted: snapshot.libraries.len(),
            installed,
            up_to_date,
            unresolved: Vec::new(),
            snapshot_written: false,
            skipped_resolution: true,
        });
    }

    // An advisory snapshot with unchanged direct dependencies pins the
    // transitive versions it recorded
    let pinned: HashMap<String, Version> = existing
        .as_ref()
        .filter(|s| s.matches_dependency_groups(&groups))
        .map(|s| {
            s.library_entries()
                .filter_map(|(name, version, _)| {
                    Version::parse(version).map(|v| (name.to_lowercase(), v))
                })
                .collect()
        })
        .unwrap_or_default();

    let frameworks = manifest.target_frameworks()?;
    if frameworks.is_empty() {
        return Err(KeelError::Project {
            message: format!("{} declares no target frameworks", manifest.package.name),
        }
        .into());
    }

    let workspace_root = project_root.parent().unwrap_or(project_root);
    let providers: Vec<Arc<dyn DependencyProvider>> = {
        let mut providers: Vec<Arc<dyn DependencyProvider>> = Vec::new();
        providers.push(Arc::new(ProjectReferenceProvider::new(Arc::new(
            WorkspaceProjects::discover(workspace_root)?,
        ))));
        providers.push(Arc::new(PackageProvider::new(
            feeds.clone(),
            cache.clone(),
            client.clone(),
            PackageProviderOptions {
                no_cache: options.no_cache,
                ignore_failed_sources: options.ignore_failed_sources,
                feed_timeout: options.feed_timeout,
            },
        )));
        if let Some(ref list) = options.redist_list {
            providers.push(Arc::new(ReferenceAssemblyProvider::from_redist_list(list)?));
        }
        if !options.machine_assembly_roots.is_empty() {
            providers.push(Arc::new(MachineAssemblyProvider::new(
                options.machine_assembly_roots.clone(),
            )));
        }
        providers
    };

    let root_range = LibraryRange::restricted(
        manifest.package.name.clone(),
        VersionConstraint::exact(manifest.version()?),
        vec![LibraryKind::Project],
    );

    if !pinned.is_empty() {
        tracing::debug!("Pinning {} versions from the advisory snapshot", pinned.len());
    }

    // Independent frameworks walk in parallel; each task owns its graph
    let sp = spinner("Resolving dependencies...");
    let mut join_set = JoinSet::new();
    for (i, framework) in frameworks.iter().cloned().enumerate() {
        let providers = providers.clone();
        let root_range = root_range.clone();
        let pinned = pinned.clone();
        join_set.spawn(async move {
            let walker = DependencyWalker::new(providers).with_pinned(pinned);
            let result = walker.walk(&root_range, &framework).await.map(|mut graph| {
                resolve_conflicts(&mut graph)
            });
            (i, result)
        });
    }

    let mut sets: Vec<Option<ResolvedSet>> = (0..frameworks.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (i, result) = joined.map_err(|e| KeelError::Resolution {
            message: format!("Resolution task failed: {e}"),
        })?;
        sets[i] = Some(result?);
    }
    let sets: Vec<ResolvedSet> = sets.into_iter().map(|s| s.expect("walk completed")).collect();
    sp.finish_and_clear();

    let mut unresolved: Vec<UnresolvedLibrary> = Vec::new();
    for set in &sets {
        if options.verbose && !set.conflicts.is_empty() {
            eprintln!("{}", set.conflicts);
        }
        for entry in &set.unresolved {
            status_warn("Unresolved", &format!("{entry} ({})", set.framework));
            unresolved.push(entry.clone());
        }
    }

    // Acquire every accepted package not yet verified present
    let mut installed = 0u32;
    let mut up_to_date = 0u32;
    let mut seen: HashSet<String> = HashSet::new();
    for set in &sets {
        for library in set.packages() {
            let key = library.identity.key();
            if !seen.insert(key) {
                continue;
            }
            let name = library.identity.name.clone();
            let version = library.identity.version.to_string();
            match install::ensure_installed(&cache, &feeds, &client, &name, &version).await? {
                InstallOutcome::Installed => installed += 1,
                InstallOutcome::AlreadyInstalled => up_to_date += 1,
            }
        }
    }

    let accepted: usize = sets.iter().map(|s| s.accepted.len()).sum();
    let mut snapshot_written = false;

    if unresolved.is_empty() {
        let snapshot = build_snapshot(&sets, &cache, groups, options.lock)?;
        snapshot_written = snapshot.write_to(&snapshot_path)?;
        status(
            "Restored",
            &format!(
                "{accepted} libraries for {} framework(s), {installed} installed, {up_to_date} up-to-date",
                frameworks.len()
            ),
        );
    } else {
        status_warn(
            "Incomplete",
            &format!("{} unresolved dependencies; snapshot not written", unresolved.len()),
        );
    }

    Ok(RestoreSummary {
        frameworks: frameworks.iter().map(|f| f.short_name().to_string()).collect(),
        accepted,
        installed,
        up_to_date,
        unresolved,
        snapshot_written,
        skipped_resolution: false,
    })
}

/// Assemble the durable snapshot from the per-framework resolved sets.
fn build_snapshot(
    sets: &[ResolvedSet],
    cache: &PackageCache,
    groups: BTreeMap<String, Vec<String>>,
    lock: bool,
) -> miette::Result<LockSnapshot> {
    let mut snapshot = LockSnapshot {
        locked: lock,
        project_file_dependency_groups: groups,
        ..Default::default()
    };

    for set in sets {
        let mut target = BTreeMap::new();
        for library in &set.accepted {
            if !matches!(
                library.identity.kind,
                LibraryKind::Package | LibraryKind::Project
            ) {
                continue;
            }
            let group = assets::framework_group_for(library, cache, &set.framework)?;
            target.insert(library.identity.key(), group);
        }
        snapshot
            .targets
            .insert(set.framework.short_name().to_string(), target);
    }

    for set in sets {
        for library in set.packages() {
            let key = library.identity.key();
            if snapshot.libraries.contains_key(&key) {
                continue;
            }
            let name = &library.identity.name;
            let version = library.identity.version.to_string();
            let sha512 = cache.recorded_hash(name, &version).ok_or_else(|| {
                KeelError::Snapshot {
                    message: format!("No recorded hash for {key}"),
                }
            })?;
            let files = cache.files(name, &version)?;
            snapshot.libraries.insert(key, LockLibrary { sha512, files });
        }
    }

    Ok(snapshot)
}
