use keel_core::framework::TargetFramework;
use keel_core::library::LibraryKind;
use keel_core::project::{ProjectLocator, ProjectManifest, WorkspaceProjects};

const MANIFEST: &str = r#"
[package]
name = "web-app"
version = "1.0.0"

[dependencies]
"PackageA" = "1.2.0"
"Shared.Utils" = { version = "0.5.0", kind = "project" }

[frameworks.net45]
dependencies = { "Desktop.Only" = "3.0.0" }

[frameworks.core10]

[feeds]
default = "https://feed.example.com/packages/"
"#;

#[test]
fn parse_manifest() {
    let manifest = ProjectManifest::parse_toml(MANIFEST).unwrap();
    assert_eq!(manifest.package.name, "web-app");
    assert_eq!(manifest.version().unwrap().to_string(), "1.0.0");
    assert_eq!(manifest.dependencies.len(), 2);
    assert_eq!(manifest.frameworks.len(), 2);
}

#[test]
fn target_frameworks_in_sorted_order() {
    let manifest = ProjectManifest::parse_toml(MANIFEST).unwrap();
    let frameworks = manifest.target_frameworks().unwrap();
    let names: Vec<_> = frameworks.iter().map(|f| f.short_name().to_string()).collect();
    assert_eq!(names, vec!["core10", "net45"]);
}

#[test]
fn dependencies_merge_framework_section() {
    let manifest = ProjectManifest::parse_toml(MANIFEST).unwrap();
    let net45 = TargetFramework::parse("net45").unwrap();
    let core10 = TargetFramework::parse("core10").unwrap();

    let net_deps = manifest.dependencies_for(&net45).unwrap();
    assert_eq!(net_deps.len(), 3);
    assert!(net_deps.iter().any(|d| d.range.name == "Desktop.Only"));

    let core_deps = manifest.dependencies_for(&core10).unwrap();
    assert_eq!(core_deps.len(), 2);
}

#[test]
fn detailed_dependency_restricts_kind() {
    let manifest = ProjectManifest::parse_toml(MANIFEST).unwrap();
    let net45 = TargetFramework::parse("net45").unwrap();
    let deps = manifest.dependencies_for(&net45).unwrap();

    let shared = deps.iter().find(|d| d.range.name == "Shared.Utils").unwrap();
    assert!(shared.range.permits(LibraryKind::Project));
    assert!(!shared.range.permits(LibraryKind::Package));

    let package = deps.iter().find(|d| d.range.name == "PackageA").unwrap();
    assert!(package.range.permits(LibraryKind::Package));
    assert!(package.range.permits(LibraryKind::Project));
}

#[test]
fn dependency_groups_for_lock_comparison() {
    let manifest = ProjectManifest::parse_toml(MANIFEST).unwrap();
    let groups = manifest.dependency_groups().unwrap();

    assert_eq!(
        groups.get(""),
        Some(&vec![
            "PackageA >= 1.2.0".to_string(),
            "Shared.Utils >= 0.5.0".to_string()
        ])
    );
    assert_eq!(groups.get("net45"), Some(&vec!["Desktop.Only >= 3.0.0".to_string()]));
    assert_eq!(groups.get("core10"), Some(&vec![]));
}

#[test]
fn invalid_constraint_is_a_project_error() {
    let bad = r#"
[package]
name = "app"
version = "1.0.0"

[dependencies]
"PackageA" = "not-a-version"
"#;
    let manifest = ProjectManifest::parse_toml(bad).unwrap();
    assert!(manifest.dependency_groups().is_err());
}

#[test]
fn workspace_discovery_finds_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let write = |dir: &str, name: &str| {
        let root = tmp.path().join(dir);
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            root.join("keel.toml"),
            format!("[package]\nname = \"{name}\"\nversion = \"1.0.0\"\n"),
        )
        .unwrap();
    };
    write("app", "app");
    write("shared", "Shared.Utils");

    let projects = WorkspaceProjects::discover(tmp.path()).unwrap();
    assert!(projects.locate("shared.utils").is_some());
    assert!(projects.locate("app").is_some());
    assert!(projects.locate("missing").is_none());
}
