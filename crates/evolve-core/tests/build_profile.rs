//! The workspace release profile must keep panics recoverable.

use std::path::Path;

fn workspace_manifest() -> toml::Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../Cargo.toml");
    let text = std::fs::read_to_string(&path).unwrap();
    toml::from_str(&text).unwrap()
}

#[test]
fn release_profile_unwinds_on_panic() {
    let manifest = workspace_manifest();
    let panic = manifest
        .get("profile")
        .and_then(|p| p.get("release"))
        .and_then(|r| r.get("panic"))
        .and_then(|v| v.as_str())
        .unwrap_or("unwind");
    assert_eq!(panic, "unwind");
}

#[test]
fn no_profile_aborts_on_panic() {
    let manifest = workspace_manifest();
    let Some(profiles) = manifest.get("profile").and_then(|p| p.as_table()) else {
        return;
    };
    for (name, profile) in profiles {
        let panic = profile.get("panic").and_then(|v| v.as_str());
        assert_ne!(panic, Some("abort"), "profile {name} aborts on panic");
    }
}
