//! Third-party extension catalog and runtime.
//!
//! Each extension lives in its own directory containing a
//! `manifest.json`. The catalog knows where extensions live and removes
//! stale ones; the runtime loads whatever survives cleanup. A single
//! broken extension never takes the rest of startup down with it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// API level this runtime exposes to extensions.
pub const API_LEVEL: u32 = 7;

/// Marker file flagging an extension directory for removal.
const OBSOLETE_MARKER: &str = ".obsolete";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    /// Runtime API level the extension was built against.
    pub api_level: u32,
    /// Host version the extension is pinned to; `None` means any.
    #[serde(default)]
    pub applicable_version: Option<String>,
}

impl PluginManifest {
    /// Whether this extension can load under the given host version.
    pub fn is_applicable(&self, host_version: &str) -> bool {
        if self.api_level != API_LEVEL {
            return false;
        }
        match &self.applicable_version {
            Some(pinned) => pinned == host_version,
            None => true,
        }
    }
}

fn read_manifest(dir: &Path) -> Result<PluginManifest> {
    let path = dir.join("manifest.json");
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| Error::ManifestInvalid {
        path,
        message: e.to_string(),
    })
}

/// Knows where extensions are installed.
pub struct PluginCatalog {
    dirs: Vec<PathBuf>,
    host_version: String,
}

impl PluginCatalog {
    pub fn new(plugin_dir: PathBuf, default_plugin_dir: PathBuf, host_version: String) -> Self {
        Self {
            dirs: vec![plugin_dir, default_plugin_dir],
            host_version,
        }
    }

    /// Remove extension directories that can no longer load: unreadable
    /// manifest, wrong API level or host pin, or an explicit obsolete
    /// marker. Returns how many were removed; individual removal
    /// failures are logged and skipped.
    pub fn cleanup_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in &self.dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping missing plugin dir {:?}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }

                let stale = if path.join(OBSOLETE_MARKER).exists() {
                    true
                } else {
                    match read_manifest(&path) {
                        Ok(manifest) => !manifest.is_applicable(&self.host_version),
                        Err(e) => {
                            debug!("Unreadable manifest in {:?}: {}", path, e);
                            true
                        }
                    }
                };

                if stale {
                    match fs::remove_dir_all(&path) {
                        Ok(()) => {
                            info!("Removed stale extension at {:?}", path);
                            removed += 1;
                        }
                        Err(e) => warn!("Failed to remove stale extension {:?}: {}", path, e),
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Manifests of every loadable extension, primary directory first.
    pub fn manifests(&self) -> Vec<(PathBuf, PluginManifest)> {
        let mut found = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                match read_manifest(&path) {
                    Ok(manifest) if manifest.is_applicable(&self.host_version) => {
                        found.push((path, manifest));
                    }
                    Ok(manifest) => {
                        debug!("Skipping inapplicable extension '{}'", manifest.name);
                    }
                    Err(e) => debug!("Skipping {:?}: {}", path, e),
                }
            }
        }
        found.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        found
    }
}

pub struct LoadedPlugin {
    pub name: String,
    pub version: String,
    pub dir: PathBuf,
}

/// Holds the loaded extension set.
pub struct PluginRuntime {
    plugins: Vec<LoadedPlugin>,
}

impl PluginRuntime {
    /// Load every extension the catalog offers.
    ///
    /// Per-extension failures are logged and skipped; this never fails
    /// as a whole.
    pub fn load_all(catalog: &PluginCatalog) -> Self {
        let mut plugins = Vec::new();
        for (dir, manifest) in catalog.manifests() {
            match Self::load_one(&dir, &manifest) {
                Ok(plugin) => {
                    info!("Loaded extension '{}' {}", plugin.name, plugin.version);
                    plugins.push(plugin);
                }
                Err(e) => warn!("Failed to load extension '{}': {}", manifest.name, e),
            }
        }
        info!("{} extension(s) loaded", plugins.len());
        Self { plugins }
    }

    fn load_one(dir: &Path, manifest: &PluginManifest) -> Result<LoadedPlugin> {
        // The entry payload must exist even though sandboxed execution
        // happens elsewhere.
        let payload = dir.join("plugin.dll");
        if !payload.exists() {
            return Err(Error::ManifestInvalid {
                path: dir.to_path_buf(),
                message: "missing plugin payload".to_string(),
            });
        }
        Ok(LoadedPlugin {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            dir: dir.to_path_buf(),
        })
    }

    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Unload every extension, most recently loaded first.
    pub fn unload_all(&mut self) {
        for plugin in self.plugins.drain(..).rev() {
            info!("Unloaded extension '{}'", plugin.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_plugin(root: &Path, name: &str, api_level: u32, with_payload: bool) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let manifest = serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "api_level": api_level,
        });
        fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
        if with_payload {
            fs::write(dir.join("plugin.dll"), b"payload").unwrap();
        }
        dir
    }

    fn catalog(primary: &Path, fallback: &Path) -> PluginCatalog {
        PluginCatalog::new(primary.to_path_buf(), fallback.to_path_buf(), "5.58".into())
    }

    #[test]
    fn test_cleanup_removes_stale_keeps_valid() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let good = write_plugin(dir.path(), "good", API_LEVEL, true);
        let old = write_plugin(dir.path(), "old", API_LEVEL - 1, true);
        let marked = write_plugin(dir.path(), "marked", API_LEVEL, true);
        fs::write(marked.join(OBSOLETE_MARKER), b"").unwrap();

        let removed = catalog(dir.path(), fallback.path()).cleanup_stale().unwrap();
        assert_eq!(removed, 2);
        assert!(good.exists());
        assert!(!old.exists());
        assert!(!marked.exists());
    }

    #[test]
    fn test_cleanup_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let cat = PluginCatalog::new(
            dir.path().join("absent"),
            dir.path().join("also-absent"),
            "5.58".into(),
        );
        assert_eq!(cat.cleanup_stale().unwrap(), 0);
    }

    #[test]
    fn test_load_skips_broken_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "works", API_LEVEL, true);
        write_plugin(dir.path(), "broken", API_LEVEL, false);

        let runtime = PluginRuntime::load_all(&catalog(dir.path(), fallback.path()));
        assert_eq!(runtime.count(), 1);
        assert_eq!(runtime.names(), vec!["works"]);
    }

    #[test]
    fn test_version_pin_filters_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let pinned = dir.path().join("pinned");
        fs::create_dir_all(&pinned).unwrap();
        let manifest = serde_json::json!({
            "name": "pinned",
            "version": "2.0.0",
            "api_level": API_LEVEL,
            "applicable_version": "9.99",
        });
        fs::write(pinned.join("manifest.json"), manifest.to_string()).unwrap();
        fs::write(pinned.join("plugin.dll"), b"payload").unwrap();

        let runtime = PluginRuntime::load_all(&catalog(dir.path(), fallback.path()));
        assert_eq!(runtime.count(), 0);
    }

    #[test]
    fn test_unload_clears_set() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        write_plugin(dir.path(), "one", API_LEVEL, true);

        let mut runtime = PluginRuntime::load_all(&catalog(dir.path(), fallback.path()));
        assert_eq!(runtime.count(), 1);
        runtime.unload_all();
        assert_eq!(runtime.count(), 0);
    }
}
