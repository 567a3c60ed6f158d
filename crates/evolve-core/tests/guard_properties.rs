//! Kernel Guard properties over synthetic and scanned manifests.

use std::fs;
use std::path::Path;

use evolve_core::{
    CaseSensitivity, EntryKind, FileManifest, KernelGuard, ManifestEntry, ManifestFilter,
    ProtectedPaths, ViolationRule,
};

fn guard() -> KernelGuard {
    KernelGuard::new(ProtectedPaths::core_defaults(), CaseSensitivity::Sensitive).unwrap()
}

#[test]
fn protected_root_or_nested_path_is_unsafe_and_named() {
    let g = guard();
    for offender in ["core", "core/brain.py", "core/a/b/c.txt", "./core/x"] {
        let manifest = FileManifest::from_paths(["readme.txt", offender, "tool/main.src"]);
        let verdict = g.verify_integrity(&manifest);
        assert!(!verdict.is_safe(), "{offender}");
        assert_eq!(verdict.offending_paths(), vec![offender]);
    }
}

#[test]
fn plain_relative_paths_are_safe() {
    let manifest = FileManifest::from_paths([
        "readme.txt",
        "tool/main.src",
        "tool/helpers/io.py",
        "assets/logo.svg",
        "kernel.md",
        "cores/x.py",
    ]);
    let verdict = guard().verify_integrity(&manifest);
    assert!(verdict.is_safe(), "{:?}", verdict.violations);
    assert_eq!(verdict.checked, 6);
}

#[test]
fn traversal_or_absolute_paths_are_unsafe() {
    let g = guard();
    for bad in ["../x", "a/../../b", "tool/../../../etc/passwd", "/etc/passwd", "/tmp/a"] {
        let verdict = g.verify_integrity(&FileManifest::from_paths([bad]));
        assert!(!verdict.is_safe(), "{bad}");
        assert!(verdict.violations.iter().any(|v| matches!(
            v.rule,
            ViolationRule::ParentTraversal | ViolationRule::AbsolutePath
        )));
    }
}

#[test]
fn verification_is_idempotent() {
    let g = guard();
    let manifest =
        FileManifest::from_paths(["ok.txt", "../core/secrets.cfg", ".env", "x/.git/HEAD"]);
    let first = g.verify_integrity(&manifest);
    let second = g.verify_integrity(&manifest);
    assert_eq!(first, second);
}

#[test]
fn traversal_into_core_is_listed_by_path() {
    let manifest = FileManifest::from_paths(["readme.txt", "../core/secrets.cfg"]);
    let verdict = guard().verify_integrity(&manifest);
    assert!(!verdict.is_safe());
    assert_eq!(verdict.offending_paths(), vec!["../core/secrets.cfg"]);
    assert!(verdict.summary().contains("../core/secrets.cfg"));
}

#[test]
fn non_regular_entries_are_unsafe() {
    let manifest = FileManifest::from_entries(vec![
        ManifestEntry::file("a.txt"),
        ManifestEntry {
            path: "link".into(),
            kind: EntryKind::Symlink,
        },
        ManifestEntry {
            path: "fifo".into(),
            kind: EntryKind::Other,
        },
    ]);
    let verdict = guard().verify_integrity(&manifest);
    assert_eq!(verdict.offending_paths(), vec!["link", "fifo"]);
}

#[test]
fn empty_manifest_is_safe() {
    assert!(guard().verify_integrity(&FileManifest::default()).is_safe());
}

#[test]
fn case_folding_follows_target_filesystem() {
    let manifest = FileManifest::from_paths(["Core/brain.py", "CORE/x", "sub/.ENV"]);
    let sensitive = guard().verify_integrity(&manifest);
    assert!(sensitive.is_safe());

    let insensitive =
        KernelGuard::new(ProtectedPaths::core_defaults(), CaseSensitivity::Insensitive).unwrap();
    let verdict = insensitive.verify_integrity(&manifest);
    assert_eq!(verdict.offending_paths().len(), 3);
}

#[cfg(unix)]
#[test]
fn scanned_symlink_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ok.py"), "x").unwrap();
    std::os::unix::fs::symlink("/etc/hostname", dir.path().join("host")).unwrap();

    let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
    let verdict = guard().verify_integrity(&manifest);
    assert_eq!(verdict.offending_paths(), vec!["host"]);
    assert!(matches!(
        verdict.violations[0].rule,
        ViolationRule::NotRegularFile {
            kind: EntryKind::Symlink
        }
    ));
}

#[test]
fn scanned_tree_with_protected_content_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for rel in ["tool/main.py", "core/override.py", ".env"] {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap_or(Path::new("."))).unwrap();
        fs::write(path, "x").unwrap();
    }

    let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
    let verdict = guard().verify_integrity(&manifest);
    assert_eq!(verdict.offending_paths(), vec![".env", "core/override.py"]);
}
