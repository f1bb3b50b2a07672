use keel_core::version::{Version, VersionConstraint};

#[test]
fn basic_ordering() {
    let v1 = Version::parse("1.0").unwrap();
    let v2 = Version::parse("2.0").unwrap();
    assert!(v1 < v2);
}

#[test]
fn four_part_ordering() {
    let v1 = Version::parse("1.0.0.0").unwrap();
    let v2 = Version::parse("1.0.0.1").unwrap();
    let v3 = Version::parse("1.0.1").unwrap();
    assert!(v1 < v2);
    assert!(v2 < v3);
}

#[test]
fn missing_parts_are_zero() {
    assert_eq!(Version::parse("1.0").unwrap(), Version::parse("1.0.0.0").unwrap());
}

#[test]
fn release_sorts_after_prerelease() {
    let pre = Version::parse("1.0.0-beta1").unwrap();
    let rel = Version::parse("1.0.0").unwrap();
    assert!(pre < rel);
}

#[test]
fn prerelease_compares_case_insensitively() {
    let a = Version::parse("1.0.0-BETA").unwrap();
    let b = Version::parse("1.0.0-beta").unwrap();
    assert_eq!(a, b);

    let alpha = Version::parse("1.0.0-alpha").unwrap();
    let beta = Version::parse("1.0.0-beta").unwrap();
    assert!(alpha < beta);
}

#[test]
fn display_round_trips_original() {
    assert_eq!(Version::parse("1.8.0-rc2").unwrap().to_string(), "1.8.0-rc2");
}

#[test]
fn malformed_versions_rejected() {
    assert!(Version::parse("").is_none());
    assert!(Version::parse("1.2.3.4.5").is_none());
    assert!(Version::parse("1.x").is_none());
    assert!(Version::parse("1.0-").is_none());
}

#[test]
fn bare_version_is_at_least() {
    let c = VersionConstraint::parse("1.2.3").unwrap();
    assert!(!c.floating);
    assert!(c.satisfied_by(&Version::parse("1.2.3").unwrap()));
    assert!(c.satisfied_by(&Version::parse("9.0").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("1.2.2").unwrap()));
}

#[test]
fn floating_constraint_parses() {
    let c = VersionConstraint::parse("1.0-*").unwrap();
    assert!(c.floating);
    assert!(c.satisfied_by(&Version::parse("1.0").unwrap()));
    assert!(c.satisfied_by(&Version::parse("1.9").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("0.9").unwrap()));

    let any = VersionConstraint::parse("*").unwrap();
    assert!(any.floating);
    assert!(any.satisfied_by(&Version::parse("0.0.1").unwrap()));
}

#[test]
fn range_inclusive() {
    let c = VersionConstraint::parse("[1.0,2.0]").unwrap();
    assert!(c.satisfied_by(&Version::parse("1.0").unwrap()));
    assert!(c.satisfied_by(&Version::parse("1.5").unwrap()));
    assert!(c.satisfied_by(&Version::parse("2.0").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("0.9").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("2.1").unwrap()));
}

#[test]
fn range_exclusive_upper() {
    let c = VersionConstraint::parse("[1.0,2.0)").unwrap();
    assert!(c.satisfied_by(&Version::parse("1.9.9").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("2.0").unwrap()));
}

#[test]
fn range_open_lower() {
    let c = VersionConstraint::parse("(,2.0)").unwrap();
    assert!(c.satisfied_by(&Version::parse("1.0").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("2.0").unwrap()));
}

#[test]
fn exact_range() {
    let c = VersionConstraint::parse("[1.5]").unwrap();
    assert!(c.is_exact());
    assert!(c.satisfied_by(&Version::parse("1.5").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("1.4").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("1.6").unwrap()));
}

#[test]
fn intersection_narrows_window() {
    let a = VersionConstraint::parse("1.0").unwrap();
    let b = VersionConstraint::parse("[1.5,3.0)").unwrap();
    let c = a.intersect(&b).unwrap();
    assert!(c.satisfied_by(&Version::parse("1.5").unwrap()));
    assert!(c.satisfied_by(&Version::parse("2.9").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("1.4").unwrap()));
    assert!(!c.satisfied_by(&Version::parse("3.0").unwrap()));
}

#[test]
fn disjoint_intersection_is_empty() {
    let a = VersionConstraint::parse("[1.0,2.0)").unwrap();
    let b = VersionConstraint::parse("[2.0,3.0)").unwrap();
    assert!(a.intersect(&b).is_none());
}

#[test]
fn intersection_floats_only_when_both_float() {
    let float = VersionConstraint::parse("1.0-*").unwrap();
    let fixed = VersionConstraint::parse("1.2").unwrap();
    assert!(!float.intersect(&fixed).unwrap().floating);
    assert!(float.intersect(&float).unwrap().floating);
}

#[test]
fn fixing_a_floating_constraint_pins_it() {
    let float = VersionConstraint::parse("1.0-*").unwrap();
    let fixed = float.fixed_to(&Version::parse("1.4.2").unwrap());
    assert!(fixed.is_exact());
    assert!(!fixed.floating);
    assert!(fixed.satisfied_by(&Version::parse("1.4.2").unwrap()));
    assert!(!fixed.satisfied_by(&Version::parse("1.4.3").unwrap()));
}

#[test]
fn display_is_stable() {
    assert_eq!(VersionConstraint::parse("1.2.3").unwrap().to_string(), ">= 1.2.3");
    assert_eq!(VersionConstraint::parse("[1.5]").unwrap().to_string(), "= 1.5");
    assert_eq!(
        VersionConstraint::parse("[1.0,2.0)").unwrap().to_string(),
        "[1.0, 2.0)"
    );
    assert_eq!(
        VersionConstraint::parse("1.0-*").unwrap().to_string(),
        ">= 1.0 (floating)"
    );
}

#[test]
fn malformed_constraints_rejected() {
    assert!(VersionConstraint::parse("").is_none());
    assert!(VersionConstraint::parse("[1.0,2.0").is_none());
    assert!(VersionConstraint::parse("(1.5)").is_none());
    assert!(VersionConstraint::parse("nope").is_none());
}
