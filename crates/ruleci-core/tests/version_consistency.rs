//! Ensures all workspace crates use `version.workspace = true`, that the
//! workspace version matches the compiled crate version, and that every
//! profile keeps unwinding enabled.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path.join("Cargo.toml")).unwrap();
    text.parse().unwrap()
}

#[test]
fn all_crates_use_workspace_version() {
    let root = workspace_root();
    let members = manifest(&root)["workspace"]["members"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(members.len(), 3);

    for member in members {
        let member = member.as_str().unwrap();
        let doc = manifest(&root.join(member));
        let uses_workspace = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(
            uses_workspace,
            Some(true),
            "{} should use version.workspace = true",
            member
        );
    }
}

#[test]
fn workspace_version_matches_cargo_pkg() {
    let doc = manifest(&workspace_root());
    let ws_version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(ws_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(ruleci_core::VERSION, ws_version);
}

#[test]
fn profiles_keep_unwinding() {
    let doc = manifest(&workspace_root());
    let profiles = doc["profile"].as_table().unwrap();
    assert!(profiles.contains_key("release"));

    for (name, profile) in profiles {
        let strategy = profile.get("panic").and_then(|v| v.as_str());
        assert_ne!(
            strategy,
            Some("abort"),
            "profile.{name} must unwind so rule panics become failures"
        );
    }
}
