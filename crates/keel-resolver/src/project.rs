//! Project-reference provider: resolves sibling projects by name through a
//! caller-supplied locator.

use std::sync::Arc;

use async_trait::async_trait;

use keel_core::framework::TargetFramework;
use keel_core::library::{
    DependencyFlags, Library, LibraryDependency, LibraryIdentity, LibraryKind, LibraryRange,
};
use keel_core::project::ProjectLocator;
use keel_core::version::VersionConstraint;

use crate::provider::{kind_permitted, DependencyProvider};

/// Standard references every desktop-framework project picks up implicitly.
pub const STANDARD_DESKTOP_REFERENCES: &[&str] =
    &["mscorlib", "System", "System.Core", "Microsoft.CSharp"];

/// Resolves project references against a workspace locator.
pub struct ProjectReferenceProvider {
    locator: Arc<dyn ProjectLocator>,
}

impl ProjectReferenceProvider {
    pub fn new(locator: Arc<dyn ProjectLocator>) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl DependencyProvider for ProjectReferenceProvider {
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool {
        kind_permitted(kinds, LibraryKind::Project)
    }

    async fn resolve(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> miette::Result<Option<Library>> {
        let project = match self.locator.locate(&range.name) {
            Some(project) => project,
            None => return Ok(None),
        };

        let manifest = &project.manifest;
        let version = manifest.version()?;

        // A project that declares target frameworks but matches none of
        // them occupies an unresolved slot rather than vanishing
        let declared = manifest.target_frameworks()?;
        if !declared.is_empty() && !declared.iter().any(|fw| framework.supports(fw)) {
            tracing::warn!(
                "Project '{}' targets none of the frameworks compatible with {framework}",
                manifest.package.name
            );
            return Ok(Some(Library::unresolved(range)));
        }

        let mut dependencies = manifest.dependencies_for(framework)?;

        if framework.is_desktop() {
            for reference in STANDARD_DESKTOP_REFERENCES {
                let already_declared = dependencies
                    .iter()
                    .any(|d| d.range.name.eq_ignore_ascii_case(reference));
                if already_declared {
                    continue;
                }
                dependencies.push(LibraryDependency {
                    range: LibraryRange::restricted(
                        *reference,
                        VersionConstraint {
                            min: None,
                            max: None,
                            floating: false,
                        },
                        vec![LibraryKind::ReferenceAssembly, LibraryKind::PlatformAssembly],
                    ),
                    flags: DependencyFlags::framework(),
                });
            }
        }

        Ok(Some(Library {
            range: range.clone(),
            identity: LibraryIdentity::new(
                manifest.package.name.clone(),
                version,
                LibraryKind::Project,
            ),
            dependencies,
            resolved: true,
            path: Some(project.root.clone()),
        }))
    }
}
