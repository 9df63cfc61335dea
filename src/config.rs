//! Loads `lockbalance.toml`, if one exists, to replace the built-in lock
//! catalog. Modeled on how `lockcheck` discovers its own per-project config:
//! walk up from the current directory looking for a `Cargo.toml` marker,
//! then look beside it for the tool's own config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::{LockCatalog, LockFamily};

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "family", default)]
    families: Vec<RawFamily>,
}

#[derive(Debug, Deserialize)]
struct RawFamily {
    name: String,
    acquire: String,
    release: String,
}

/// Finds and loads `lockbalance.toml`, if present, starting the search from
/// `start` and walking up through its ancestors. Absence of the file is not
/// an error: the caller falls back to [`LockCatalog::default_catalog`]. A
/// file that exists but fails to parse is.
pub(crate) fn load_catalog(start: &Path) -> Result<LockCatalog> {
    match find_config(start) {
        Some(config_path) => load_catalog_from(&config_path),
        None => Ok(LockCatalog::default_catalog()),
    }
}

/// Loads a catalog from an explicit `--config` path, bypassing discovery.
/// Unlike [`load_catalog`], a missing file here is an error: the user named
/// this path directly.
pub(crate) fn load_catalog_from(config_path: &Path) -> Result<LockCatalog> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let raw: RawConfig = toml::from_str(&text)
        .with_context(|| format!("invalid format in {}", config_path.display()))?;
    let families = raw
        .families
        .into_iter()
        .map(|f| LockFamily {
            name: f.name,
            acquire_name: f.acquire,
            release_name: f.release,
        })
        .collect();
    LockCatalog::new(families).with_context(|| format!("invalid lock families in {}", config_path.display()))
}

fn find_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        if !dir.join("Cargo.toml").exists() {
            continue;
        }
        let candidate = dir.join("lockbalance.toml");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_falls_back_to_default_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load_catalog(dir.path()).unwrap();
        assert_eq!(catalog.len(), LockCatalog::default_catalog().len());
    }

    #[test]
    fn present_config_replaces_default_families() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("Cargo.toml")).unwrap();
        let mut config_file = std::fs::File::create(dir.path().join("lockbalance.toml")).unwrap();
        writeln!(
            config_file,
            r#"
            [[family]]
            name = "custom"
            acquire = "my_lock"
            release = "my_unlock"
            "#
        )
        .unwrap();

        let catalog = load_catalog(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.families()[0].name, "custom");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("Cargo.toml")).unwrap();
        std::fs::write(dir.path().join("lockbalance.toml"), "not valid toml [[[").unwrap();
        assert!(load_catalog(dir.path()).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom-name.toml");
        std::fs::write(
            &path,
            r#"
            [[family]]
            name = "custom"
            acquire = "my_lock"
            release = "my_unlock"
            "#,
        )
        .unwrap();
        let catalog = load_catalog_from(&path).unwrap();
        assert_eq!(catalog.families()[0].name, "custom");
    }

    #[test]
    fn explicit_missing_config_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_catalog_from(&dir.path().join("missing.toml")).is_err());
    }
}
