//! In-memory provider for walker and conflict tests.

use std::collections::HashMap;

use async_trait::async_trait;

use keel_core::framework::TargetFramework;
use keel_core::library::{
    Library, LibraryDependency, LibraryIdentity, LibraryKind, LibraryRange,
};
use keel_core::version::{Version, VersionConstraint};

use crate::provider::{kind_permitted, DependencyProvider};

/// A package provider backed by a static map of libraries and their
/// dependency edges. Resolution picks the highest known version satisfying
/// the range.
#[derive(Default)]
pub struct StaticProvider {
    // lowercased name -> (version, canonical name, deps as (name, constraint))
    libraries: HashMap<String, Vec<(Version, String, Vec<(String, String)>)>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        self.libraries
            .entry(name.to_lowercase())
            .or_default()
            .push((
                Version::parse(version).expect("valid test version"),
                name.to_string(),
                deps.iter()
                    .map(|(n, c)| (n.to_string(), c.to_string()))
                    .collect(),
            ));
        self
    }
}

#[async_trait]
impl DependencyProvider for StaticProvider {
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool {
        kind_permitted(kinds, LibraryKind::Package)
    }

    async fn resolve(
        &self,
        range: &LibraryRange,
        _framework: &TargetFramework,
    ) -> miette::Result<Option<Library>> {
        let candidates = match self.libraries.get(&range.name.to_lowercase()) {
            Some(c) => c,
            None => return Ok(None),
        };

        let best = candidates
            .iter()
            .filter(|(v, _, _)| range.constraint.satisfied_by(v))
            .max_by(|a, b| a.0.cmp(&b.0));

        let (version, canonical, deps) = match best {
            Some(found) => found,
            None => return Ok(None),
        };

        let dependencies = deps
            .iter()
            .map(|(name, constraint)| {
                LibraryDependency::new(LibraryRange::any(
                    name,
                    VersionConstraint::parse(constraint).expect("valid test constraint"),
                ))
            })
            .collect();

        Ok(Some(Library {
            range: range.clone(),
            identity: LibraryIdentity::new(canonical, version.clone(), LibraryKind::Package),
            dependencies,
            resolved: true,
            path: None,
        }))
    }
}
