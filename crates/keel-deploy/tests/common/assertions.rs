//! Assertion helpers for deployment lifecycle testing

#![allow(dead_code)]

use keel_deploy::{PackageId, PackageRegistry};
use std::path::Path;

/// Assert that exactly one completed package with `id` is registered
pub fn assert_deployed(registry: &PackageRegistry, id: &PackageId) {
    let package = registry
        .find(id)
        .unwrap_or_else(|| panic!("package {} should be registered", id));
    assert!(
        package.is_deployment_complete(),
        "package {} should be complete",
        id
    );
    let matching = registry
        .packages()
        .iter()
        .filter(|p| p.id() == id)
        .count();
    assert_eq!(matching, 1, "package {} registered more than once", id);
}

/// Assert that nothing is registered and nothing is faulty
pub fn assert_registry_empty(registry: &PackageRegistry) {
    assert!(
        registry.is_empty(),
        "expected no registered packages, found {:?}",
        registry.packages().iter().map(|p| p.id().to_string()).collect::<Vec<_>>()
    );
    assert_eq!(
        registry.faulty_len(),
        0,
        "expected no faulty packages, found {:?}",
        registry.faulty_names()
    );
}

/// Assert that a directory exists and has no entries
pub fn assert_dir_empty(path: &Path) {
    let entries: Vec<_> = std::fs::read_dir(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
        .map(|e| e.unwrap().path())
        .collect();
    assert!(
        entries.is_empty(),
        "expected {} to be empty, found {:?}",
        path.display(),
        entries
    );
}
