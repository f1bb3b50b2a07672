//! Platform assembly providers: the redistributable-list reference set and
//! the machine-wide assembly registry. Both produce leaf libraries.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use keel_core::framework::TargetFramework;
use keel_core::library::{Library, LibraryIdentity, LibraryKind, LibraryRange};
use keel_core::version::Version;
use keel_util::errors::KeelError;

use crate::provider::{kind_permitted, DependencyProvider};

/// Resolves reference assemblies against a redistributable-list file:
/// `<fileList><file assemblyName="System" version="4.0.0.0"/></fileList>`.
pub struct ReferenceAssemblyProvider {
    assemblies: Vec<(String, Version)>,
    assembly_dir: PathBuf,
}

impl ReferenceAssemblyProvider {
    /// Parse the redistributable list. Errors only for a malformed file,
    /// which is a configuration problem, not a resolution failure.
    pub fn from_redist_list(list_path: &Path) -> miette::Result<Self> {
        let content = fs::read_to_string(list_path).map_err(|e| KeelError::Generic {
            message: format!("Failed to read redist list {}: {e}", list_path.display()),
        })?;
        let assemblies = parse_redist_list(&content)?;
        Ok(Self {
            assemblies,
            assembly_dir: list_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        })
    }

    #[cfg(test)]
    fn from_entries(entries: Vec<(String, Version)>, dir: PathBuf) -> Self {
        Self {
            assemblies: entries,
            assembly_dir: dir,
        }
    }
}

#[async_trait]
impl DependencyProvider for ReferenceAssemblyProvider {
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool {
        kind_permitted(kinds, LibraryKind::ReferenceAssembly)
    }

    async fn resolve(
        &self,
        range: &LibraryRange,
        _framework: &TargetFramework,
    ) -> miette::Result<Option<Library>> {
        let found = self
            .assemblies
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&range.name));
        let (name, version) = match found {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if !range.constraint.satisfied_by(version) {
            return Ok(None);
        }

        let dll = self.assembly_dir.join(format!("{name}.dll"));
        Ok(Some(Library {
            range: range.clone(),
            identity: LibraryIdentity::new(
                name.clone(),
                version.clone(),
                LibraryKind::ReferenceAssembly,
            ),
            dependencies: Vec::new(),
            resolved: true,
            path: dll.is_file().then_some(dll),
        }))
    }
}

fn parse_redist_list(xml: &str) -> miette::Result<Vec<(String, Version)>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut assemblies = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() != b"file" {
                    continue;
                }
                let mut name = None;
                let mut version = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"assemblyName" => {
                            name = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        b"version" => {
                            version = Version::parse(&String::from_utf8_lossy(&attr.value));
                        }
                        _ => {}
                    }
                }
                if let Some(name) = name {
                    assemblies.push((name, version.unwrap_or_else(Version::zero)));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(KeelError::Generic {
                    message: format!("Malformed redist list: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }
    Ok(assemblies)
}

/// Resolves platform assemblies from GAC-style directories laid out as
/// `{root}/{name}/{version}/{name}.dll`.
pub struct MachineAssemblyProvider {
    roots: Vec<PathBuf>,
}

impl MachineAssemblyProvider {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl DependencyProvider for MachineAssemblyProvider {
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool {
        kind_permitted(kinds, LibraryKind::PlatformAssembly)
    }

    async fn resolve(
        &self,
        range: &LibraryRange,
        _framework: &TargetFramework,
    ) -> miette::Result<Option<Library>> {
        let mut best: Option<(Version, PathBuf, String)> = None;

        for root in &self.roots {
            let Some(name_dir) = find_name_dir(root, &range.name) else {
                continue;
            };
            let on_disk = name_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| range.name.clone());
            let Ok(entries) = fs::read_dir(&name_dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let version_str = entry.file_name().to_string_lossy().to_string();
                let Some(version) = Version::parse(&version_str) else {
                    continue;
                };
                if !range.constraint.satisfied_by(&version) {
                    continue;
                }
                let dll = entry.path().join(format!("{on_disk}.dll"));
                if !dll.is_file() {
                    continue;
                }
                let better = best
                    .as_ref()
                    .map(|(current, _, _)| version > *current)
                    .unwrap_or(true);
                if better {
                    best = Some((version, dll, on_disk.clone()));
                }
            }
        }

        Ok(best.map(|(version, dll, name)| Library {
            range: range.clone(),
            identity: LibraryIdentity::new(name, version, LibraryKind::PlatformAssembly),
            dependencies: Vec::new(),
            resolved: true,
            path: Some(dll),
        }))
    }
}

fn find_name_dir(root: &Path, name: &str) -> Option<PathBuf> {
    let exact = root.join(name);
    if exact.is_dir() {
        return Some(exact);
    }
    let entries = fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir()
            && entry
                .file_name()
                .to_string_lossy()
                .eq_ignore_ascii_case(name)
        {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::version::VersionConstraint;

    fn request(name: &str, constraint: &str) -> LibraryRange {
        LibraryRange::any(name, VersionConstraint::parse(constraint).unwrap())
    }

    fn net45() -> TargetFramework {
        TargetFramework::parse("net45").unwrap()
    }

    #[test]
    fn parses_redist_list() {
        let xml = r#"<fileList redistName="platform">
  <file assemblyName="System" version="4.0.0.0"/>
  <file assemblyName="System.Xml" version="4.0.0.0"/>
</fileList>"#;
        let assemblies = parse_redist_list(xml).unwrap();
        assert_eq!(assemblies.len(), 2);
        assert_eq!(assemblies[0].0, "System");
    }

    #[tokio::test]
    async fn reference_assembly_is_a_leaf() {
        let provider = ReferenceAssemblyProvider::from_entries(
            vec![("System".to_string(), Version::parse("4.0.0.0").unwrap())],
            PathBuf::from("/nonexistent"),
        );

        let library = provider
            .resolve(&request("system", "1.0.0"), &net45())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(library.identity.name, "System");
        assert_eq!(library.identity.kind, LibraryKind::ReferenceAssembly);
        assert!(library.dependencies.is_empty());
        assert!(library.resolved);
    }

    #[tokio::test]
    async fn reference_assembly_honors_constraint() {
        let provider = ReferenceAssemblyProvider::from_entries(
            vec![("System".to_string(), Version::parse("4.0.0.0").unwrap())],
            PathBuf::from("/nonexistent"),
        );

        assert!(provider
            .resolve(&request("System", "5.0.0"), &net45())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn machine_registry_picks_highest_matching_version() {
        let tmp = tempfile::tempdir().unwrap();
        for version in ["2.0.0.0", "4.0.0.0"] {
            let dir = tmp.path().join("System.Data").join(version);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("System.Data.dll"), b"il").unwrap();
        }

        let provider = MachineAssemblyProvider::new(vec![tmp.path().to_path_buf()]);
        let library = provider
            .resolve(&request("system.data", "1.0.0"), &net45())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(library.identity.version.to_string(), "4.0.0.0");
        assert_eq!(library.identity.kind, LibraryKind::PlatformAssembly);
        assert!(library.path.as_ref().unwrap().ends_with("System.Data.dll"));
    }

    #[tokio::test]
    async fn machine_registry_misses_return_none() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = MachineAssemblyProvider::new(vec![tmp.path().to_path_buf()]);
        assert!(provider
            .resolve(&request("Missing", "1.0.0"), &net45())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn kind_restrictions_respected() {
        let reference = ReferenceAssemblyProvider::from_entries(Vec::new(), PathBuf::new());
        let machine = MachineAssemblyProvider::new(Vec::new());

        let platform_kinds = [LibraryKind::ReferenceAssembly, LibraryKind::PlatformAssembly];
        assert!(reference.supports(Some(&platform_kinds)));
        assert!(machine.supports(Some(&platform_kinds)));
        assert!(!reference.supports(Some(&[LibraryKind::Package])));
        assert!(!machine.supports(Some(&[LibraryKind::Project])));
    }
}
