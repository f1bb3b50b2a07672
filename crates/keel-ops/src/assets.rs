//! Per-framework asset selection for lock snapshot targets.
//!
//! For every accepted library and target framework, the snapshot records
//! the framework slice of its edges plus the runtime/compile assembly
//! paths selected from the package's own per-framework asset groups.

use keel_core::framework::{nearest_group, TargetFramework};
use keel_core::library::{Library, LibraryKind};
use keel_core::snapshot::FrameworkGroup;
use keel_feed::cache::PackageCache;

/// Build the snapshot framework group for one accepted library.
pub fn framework_group_for(
    library: &Library,
    cache: &PackageCache,
    framework: &TargetFramework,
) -> miette::Result<FrameworkGroup> {
    let mut group = FrameworkGroup::default();

    for dependency in &library.dependencies {
        if dependency.flags.build_only {
            continue;
        }
        if dependency.flags.package_dependency {
            group.dependencies.push(dependency.range.to_string());
        } else {
            // Platform/framework references travel in their own list
            group
                .framework_assemblies
                .push(dependency.range.name.clone());
        }
    }
    group.dependencies.sort();
    group.framework_assemblies.sort();

    if library.identity.kind == LibraryKind::Package {
        let name = &library.identity.name;
        let version = library.identity.version.to_string();

        if let Some(manifest) = cache.get_manifest(name, &version) {
            for assembly in manifest.framework_assemblies_for(framework) {
                group.framework_assemblies.push(assembly);
            }
        }
        group.framework_assemblies.sort();
        group.framework_assemblies.dedup();

        let files = cache.files(name, &version)?;
        group.runtime_assemblies = select_assets(&files, "lib", framework);
        group.compile_assemblies = compile_assets(&files, name, framework)
            .unwrap_or_else(|| group.runtime_assemblies.clone());
    }

    if !framework.supports_framework_assemblies() {
        group.framework_assemblies.clear();
    }

    Ok(group)
}

/// Compile-time assets: a `ref/<tfm>/` group when the package ships one,
/// with the `contract/` assembly preferred over the implementation when
/// both exist and the target is not a classic desktop framework.
fn compile_assets(
    files: &[String],
    name: &str,
    framework: &TargetFramework,
) -> Option<Vec<String>> {
    if !framework.is_desktop() {
        let contract = format!("contract/{name}.dll");
        if files.iter().any(|f| f == &contract) {
            return Some(vec![contract]);
        }
    }

    let refs = select_assets(files, "ref", framework);
    if refs.is_empty() {
        None
    } else {
        Some(refs)
    }
}

/// Select the nearest compatible asset group under `prefix` (`lib`/`ref`).
///
/// `prefix/<tfm>/*.dll` entries form one group per framework directory;
/// `prefix/*.dll` entries form the ungrouped fallback.
pub fn select_assets(files: &[String], prefix: &str, framework: &TargetFramework) -> Vec<String> {
    let mut grouped: Vec<(Option<TargetFramework>, Vec<String>)> = Vec::new();

    for file in files {
        let parts: Vec<&str> = file.split('/').collect();
        if parts.first() != Some(&prefix) || !file.ends_with(".dll") {
            continue;
        }
        let key = match parts.len() {
            2 => None,
            3 => match TargetFramework::parse(parts[1]) {
                Some(fw) => Some(fw),
                None => continue,
            },
            _ => continue,
        };
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(file.clone()),
            None => grouped.push((key, vec![file.clone()])),
        }
    }

    let candidates: Vec<Option<TargetFramework>> =
        grouped.iter().map(|(k, _)| k.clone()).collect();
    match nearest_group(framework, &candidates) {
        Some(i) => {
            let mut assets = grouped[i].1.clone();
            assets.sort();
            assets
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(name: &str) -> TargetFramework {
        TargetFramework::parse(name).unwrap()
    }

    fn files(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nearest_lib_group_wins() {
        let files = files(&[
            "lib/net40/A.dll",
            "lib/net45/A.dll",
            "lib/net47/A.dll",
            "A.pkgspec",
        ]);
        assert_eq!(
            select_assets(&files, "lib", &fw("net46")),
            vec!["lib/net45/A.dll"]
        );
    }

    #[test]
    fn ungrouped_assets_are_the_fallback() {
        let files = files(&["lib/A.dll", "lib/net47/A.dll"]);
        assert_eq!(select_assets(&files, "lib", &fw("net45")), vec!["lib/A.dll"]);
    }

    #[test]
    fn incompatible_groups_select_nothing() {
        let files = files(&["lib/net45/A.dll"]);
        assert!(select_assets(&files, "lib", &fw("core10")).is_empty());
    }

    #[test]
    fn non_assembly_files_ignored() {
        let files = files(&["lib/net45/A.dll", "lib/net45/A.xml", "lib/net45/readme.txt"]);
        assert_eq!(
            select_assets(&files, "lib", &fw("net45")),
            vec!["lib/net45/A.dll"]
        );
    }

    #[test]
    fn contract_preferred_off_desktop() {
        let files = files(&["lib/core10/A.dll", "contract/A.dll"]);
        assert_eq!(
            compile_assets(&files, "A", &fw("core10")),
            Some(vec!["contract/A.dll".to_string()])
        );
        // Desktop keeps the implementation assembly
        assert_eq!(compile_assets(&files, "A", &fw("net45")), None);
    }

    #[test]
    fn no_legacy_targets_drop_framework_assemblies() {
        use keel_core::library::{Library, LibraryIdentity, LibraryRange};
        use keel_core::version::{Version, VersionConstraint};
        use keel_util::hash::sha512_base64;

        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path());
        let dir = cache.package_dir("PackageA", "1.0.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            PackageCache::archive_path(&dir, "PackageA", "1.0.0"),
            b"bytes",
        )
        .unwrap();
        std::fs::write(
            PackageCache::manifest_path(&dir, "PackageA"),
            r#"<package>
  <id>PackageA</id>
  <version>1.0.0</version>
  <frameworkAssemblies>
    <frameworkAssembly assemblyName="System.Xml"/>
  </frameworkAssemblies>
</package>"#,
        )
        .unwrap();
        std::fs::write(
            PackageCache::hash_marker_path(&dir, "PackageA", "1.0.0"),
            sha512_base64(b"bytes"),
        )
        .unwrap();

        let library = Library {
            range: LibraryRange::any("PackageA", VersionConstraint::parse("1.0.0").unwrap()),
            identity: LibraryIdentity::new(
                "PackageA",
                Version::parse("1.0.0").unwrap(),
                LibraryKind::Package,
            ),
            dependencies: Vec::new(),
            resolved: true,
            path: None,
        };

        let on_desktop = framework_group_for(&library, &cache, &fw("net45")).unwrap();
        assert_eq!(on_desktop.framework_assemblies, vec!["System.Xml"]);

        let on_core = framework_group_for(&library, &cache, &fw("core10")).unwrap();
        assert!(on_core.framework_assemblies.is_empty());
    }

    #[test]
    fn ref_group_used_for_compile_when_present() {
        let files = files(&["lib/net45/A.dll", "ref/net45/A.dll"]);
        assert_eq!(
            compile_assets(&files, "A", &fw("net45")),
            Some(vec!["ref/net45/A.dll".to_string()])
        );
    }
}
