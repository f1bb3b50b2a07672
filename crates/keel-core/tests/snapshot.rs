use std::collections::BTreeMap;

use keel_core::snapshot::{FrameworkGroup, LockLibrary, LockSnapshot, LOCK_SNAPSHOT_VERSION};

fn sample() -> LockSnapshot {
    let mut snapshot = LockSnapshot::default();

    let mut net45 = BTreeMap::new();
    net45.insert(
        LockSnapshot::library_key("PackageA", "1.0.0"),
        FrameworkGroup {
            dependencies: vec!["PackageB >= 2.0.0".to_string()],
            framework_assemblies: vec!["System.Xml".to_string()],
            runtime_assemblies: vec!["lib/net45/PackageA.dll".to_string()],
            compile_assemblies: vec!["lib/net45/PackageA.dll".to_string()],
        },
    );
    snapshot.targets.insert("net45".to_string(), net45);

    snapshot.libraries.insert(
        "PackageA/1.0.0".to_string(),
        LockLibrary {
            sha512: "c2hhNTEy".to_string(),
            files: vec!["PackageA.pkgspec".to_string(), "lib/net45/PackageA.dll".to_string()],
        },
    );

    snapshot
        .project_file_dependency_groups
        .insert(String::new(), vec!["PackageA >= 1.0.0".to_string()]);
    snapshot
        .project_file_dependency_groups
        .insert("net45".to_string(), vec![]);

    snapshot
}

#[test]
fn round_trip_preserves_content() {
    let snapshot = sample();
    let json = snapshot.to_json_string().unwrap();
    let parsed: LockSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);
}

#[test]
fn serialization_is_byte_stable() {
    let a = sample().to_json_string().unwrap();
    let b = sample().to_json_string().unwrap();
    assert_eq!(a, b);
    assert!(a.ends_with('\n'));
}

#[test]
fn uses_camel_case_contract_keys() {
    let json = sample().to_json_string().unwrap();
    assert!(json.contains("\"projectFileDependencyGroups\""));
    assert!(json.contains("\"frameworkAssemblies\""));
    assert!(json.contains("\"runtimeAssemblies\""));
    assert!(json.contains("\"compileAssemblies\""));
    assert!(json.contains("\"sha512\""));
    assert!(!json.contains("\"framework_assemblies\""));
}

#[test]
fn write_skips_identical_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("keel.lock.json");
    let snapshot = sample();

    assert!(snapshot.write_to(&path).unwrap());
    assert!(!snapshot.write_to(&path).unwrap());

    let reloaded = LockSnapshot::from_path(&path).unwrap();
    assert_eq!(reloaded, snapshot);
}

#[test]
fn newer_schema_versions_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("keel.lock.json");
    let mut snapshot = sample();
    snapshot.version = LOCK_SNAPSHOT_VERSION + 1;
    std::fs::write(&path, snapshot.to_json_string().unwrap()).unwrap();

    assert!(LockSnapshot::from_path(&path).is_err());
}

#[test]
fn locked_fast_path_requires_matching_groups() {
    let mut snapshot = sample();
    let groups = snapshot.project_file_dependency_groups.clone();

    assert!(!snapshot.can_skip_resolution(&groups));

    snapshot.locked = true;
    assert!(snapshot.can_skip_resolution(&groups));

    let mut changed = groups.clone();
    changed.insert(String::new(), vec!["PackageA >= 2.0.0".to_string()]);
    assert!(!snapshot.can_skip_resolution(&changed));
}

#[test]
fn library_entries_split_keys() {
    let snapshot = sample();
    let entries: Vec<_> = snapshot.library_entries().collect();
    assert_eq!(entries.len(), 1);
    let (name, version, lib) = entries[0];
    assert_eq!(name, "PackageA");
    assert_eq!(version, "1.0.0");
    assert_eq!(lib.files.len(), 2);
}
