//! The Dependency Provider SPI.
//!
//! A provider is a pure function of its inputs plus its own backing store.
//! "Not found" is signaled by `Ok(None)`, never by an error; errors are
//! reserved for malformed configuration and fatal source failures.

use async_trait::async_trait;

use keel_core::framework::TargetFramework;
use keel_core::library::{Library, LibraryKind, LibraryRange};

/// A pluggable resolution source. Providers are tried in caller-supplied
/// order; the first non-`None` result wins.
#[async_trait]
pub trait DependencyProvider: Send + Sync {
    /// Whether this provider should be asked for ranges carrying the given
    /// kind restriction (`None` = unrestricted).
    fn supports(&self, kinds: Option<&[LibraryKind]>) -> bool;

    /// Resolve a range for one target framework.
    async fn resolve(
        &self,
        range: &LibraryRange,
        framework: &TargetFramework,
    ) -> miette::Result<Option<Library>>;
}

/// Whether a kind restriction permits a provider that produces `kind`.
pub fn kind_permitted(kinds: Option<&[LibraryKind]>, kind: LibraryKind) -> bool {
    match kinds {
        None => true,
        Some(kinds) => kinds.contains(&kind),
    }
}
