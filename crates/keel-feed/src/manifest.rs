//! Package manifest (`.pkgspec`) parsing: identity, per-framework dependency
//! groups, and framework-assembly references.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use keel_core::framework::{nearest_group, TargetFramework};
use keel_util::errors::KeelError;

/// A parsed package manifest.
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    pub id: Option<String>,
    pub version: Option<String>,
    pub dependency_groups: Vec<DependencyGroup>,
    pub framework_assemblies: Vec<FrameworkAssemblyRef>,
}

/// One `<group>` of dependencies; `target_framework = None` is the
/// ungrouped fallback that applies to any target.
#[derive(Debug, Clone, Default)]
pub struct DependencyGroup {
    pub target_framework: Option<String>,
    pub dependencies: Vec<ManifestDependency>,
}

/// A dependency declared by a package.
#[derive(Debug, Clone)]
pub struct ManifestDependency {
    pub id: String,
    pub version: Option<String>,
}

/// A reference to a legacy framework assembly.
#[derive(Debug, Clone)]
pub struct FrameworkAssemblyRef {
    pub assembly_name: String,
    pub target_framework: Option<String>,
}

impl PackageManifest {
    /// Dependencies effective for one target: the nearest compatible group.
    ///
    /// Groups whose framework name does not parse are ignored; an ungrouped
    /// fallback loses to every specific match.
    pub fn dependencies_for(&self, target: &TargetFramework) -> Vec<ManifestDependency> {
        let mut groups: Vec<(&DependencyGroup, Option<TargetFramework>)> = Vec::new();
        for group in &self.dependency_groups {
            match &group.target_framework {
                None => groups.push((group, None)),
                Some(name) => {
                    if let Some(fw) = TargetFramework::parse(name) {
                        groups.push((group, Some(fw)));
                    }
                }
            }
        }

        let candidates: Vec<Option<TargetFramework>> =
            groups.iter().map(|(_, fw)| fw.clone()).collect();
        match nearest_group(target, &candidates) {
            Some(i) => groups[i].0.dependencies.clone(),
            None => Vec::new(),
        }
    }

    /// Framework assembly names applicable to one target.
    pub fn framework_assemblies_for(&self, target: &TargetFramework) -> Vec<String> {
        let mut names: Vec<String> = self
            .framework_assemblies
            .iter()
            .filter(|fa| match &fa.target_framework {
                None => true,
                Some(name) => TargetFramework::parse(name)
                    .map(|fw| target.supports(&fw))
                    .unwrap_or(false),
            })
            .map(|fa| fa.assembly_name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).to_string())
        } else {
            None
        }
    })
}

/// Parse a package manifest XML string.
pub fn parse_manifest(xml: &str) -> miette::Result<PackageManifest> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut manifest = PackageManifest::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_group: Option<DependencyGroup> = None;
    // Ungrouped dependencies declared directly under <dependencies>
    let mut flat_deps: Vec<ManifestDependency> = Vec::new();

    let handle_element = |tag: &str,
                          e: &BytesStart<'_>,
                          path: &[String],
                          current_group: &mut Option<DependencyGroup>,
                          flat_deps: &mut Vec<ManifestDependency>,
                          manifest: &mut PackageManifest| {
        let ctx = path.join(">");
        match tag {
            "group" if ctx.starts_with("package>dependencies") => {
                *current_group = Some(DependencyGroup {
                    target_framework: attr(e, "targetFramework"),
                    dependencies: Vec::new(),
                });
            }
            "dependency" if ctx.starts_with("package>dependencies") => {
                if let Some(id) = attr(e, "id") {
                    let dep = ManifestDependency {
                        id,
                        version: attr(e, "version"),
                    };
                    match current_group {
                        Some(group) => group.dependencies.push(dep),
                        None => flat_deps.push(dep),
                    }
                }
            }
            "frameworkAssembly" if ctx.starts_with("package>frameworkAssemblies") => {
                if let Some(assembly_name) = attr(e, "assemblyName") {
                    manifest.framework_assemblies.push(FrameworkAssemblyRef {
                        assembly_name,
                        target_framework: attr(e, "targetFramework"),
                    });
                }
            }
            _ => {}
        }
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag.clone());
                text_buf.clear();
                handle_element(
                    &tag,
                    e,
                    &path,
                    &mut current_group,
                    &mut flat_deps,
                    &mut manifest,
                );
            }
            Ok(Event::Empty(ref e)) => {
                // Self-closing elements never produce Start/End pairs
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag.clone());
                handle_element(
                    &tag,
                    e,
                    &path,
                    &mut current_group,
                    &mut flat_deps,
                    &mut manifest,
                );
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                match ctx.as_str() {
                    "package>id" => manifest.id = Some(text_buf.clone()),
                    "package>version" => manifest.version = Some(text_buf.clone()),
                    "package>dependencies>group" => {
                        if let Some(group) = current_group.take() {
                            manifest.dependency_groups.push(group);
                        }
                    }
                    _ => {}
                }
                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(KeelError::Generic {
                    message: format!("Failed to parse package manifest: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    if !flat_deps.is_empty() {
        manifest.dependency_groups.push(DependencyGroup {
            target_framework: None,
            dependencies: flat_deps,
        });
    }

    Ok(manifest)
}
