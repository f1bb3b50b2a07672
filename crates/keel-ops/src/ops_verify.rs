//! Operation: deep verification of cached packages against the lock
//! snapshot's recorded hashes.

use std::path::Path;

use keel_core::snapshot::{LockSnapshot, SNAPSHOT_FILENAME};
use keel_feed::cache::PackageCache;
use keel_util::errors::KeelError;
use keel_util::progress::status;

/// Verify every snapshot library against the cache.
///
/// Reports all mismatches at once rather than failing on the first one.
/// Missing packages are skipped: absence is "not installed", never
/// corruption.
pub fn verify_packages(project_root: &Path, cache: &PackageCache) -> miette::Result<()> {
    let snapshot = LockSnapshot::from_path(&project_root.join(SNAPSHOT_FILENAME))?;

    let mut mismatches: Vec<String> = Vec::new();
    let mut verified = 0u32;
    let mut skipped = 0u32;

    for (name, version, lib) in snapshot.library_entries() {
        if !cache.is_installed(name, version) {
            skipped += 1;
            continue;
        }

        let recorded = cache.recorded_hash(name, version).unwrap_or_default();
        if recorded != lib.sha512 {
            mismatches.push(format!(
                "{name} {version}\n  snapshot: {}\n  cache:    {recorded}",
                lib.sha512
            ));
            continue;
        }

        if cache.verify(name, version)? {
            verified += 1;
        } else {
            mismatches.push(format!("{name} {version}\n  archive bytes no longer match the hash marker"));
        }
    }

    if mismatches.is_empty() {
        status(
            "Verified",
            &format!("{verified} packages ({skipped} not installed)"),
        );
        Ok(())
    } else {
        let count = mismatches.len();
        let details = mismatches.join("\n");
        Err(KeelError::Install {
            message: format!(
                "{count} corrupt package(s) detected:\n{details}\n\n\
                 Delete the affected cache entries and run restore again."
            ),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::snapshot::LockLibrary;
    use keel_util::hash::sha512_base64;
    use std::fs;

    fn seed_installed(cache: &PackageCache, name: &str, version: &str, bytes: &[u8]) -> String {
        let dir = cache.package_dir(name, version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(PackageCache::archive_path(&dir, name, version), bytes).unwrap();
        let hash = sha512_base64(bytes);
        fs::write(
            PackageCache::hash_marker_path(&dir, name, version),
            &hash,
        )
        .unwrap();
        hash
    }

    fn write_snapshot(root: &Path, entries: &[(&str, &str, String)]) {
        let mut snapshot = LockSnapshot::default();
        for (name, version, hash) in entries {
            snapshot.libraries.insert(
                LockSnapshot::library_key(name, version),
                LockLibrary {
                    sha512: hash.clone(),
                    files: vec![],
                },
            );
        }
        snapshot.write_to(&root.join(SNAPSHOT_FILENAME)).unwrap();
    }

    #[test]
    fn clean_cache_verifies() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path().join("packages"));
        let hash = seed_installed(&cache, "PackageA", "1.0.0", b"bytes");
        write_snapshot(tmp.path(), &[("PackageA", "1.0.0", hash)]);

        assert!(verify_packages(tmp.path(), &cache).is_ok());
    }

    #[test]
    fn missing_packages_are_skipped_not_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path().join("packages"));
        write_snapshot(tmp.path(), &[("Absent", "1.0.0", "AAAA".to_string())]);

        assert!(verify_packages(tmp.path(), &cache).is_ok());
    }

    #[test]
    fn every_mismatch_reported_at_once() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path().join("packages"));
        let good = seed_installed(&cache, "Good", "1.0.0", b"good");
        seed_installed(&cache, "BadOne", "1.0.0", b"one");
        seed_installed(&cache, "BadTwo", "1.0.0", b"two");
        write_snapshot(
            tmp.path(),
            &[
                ("Good", "1.0.0", good),
                ("BadOne", "1.0.0", "bogus-hash-1".to_string()),
                ("BadTwo", "1.0.0", "bogus-hash-2".to_string()),
            ],
        );

        let err = verify_packages(tmp.path(), &cache).unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("2 corrupt package(s)"));
        assert!(message.contains("BadOne"));
        assert!(message.contains("BadTwo"));
    }

    #[test]
    fn tampered_archive_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path().join("packages"));
        let hash = seed_installed(&cache, "PackageA", "1.0.0", b"bytes");
        write_snapshot(tmp.path(), &[("PackageA", "1.0.0", hash)]);

        // Rewrite the archive after install completed
        let dir = cache.package_dir("PackageA", "1.0.0");
        fs::write(
            PackageCache::archive_path(&dir, "PackageA", "1.0.0"),
            b"tampered",
        )
        .unwrap();

        assert!(verify_packages(tmp.path(), &cache).is_err());
    }
}
