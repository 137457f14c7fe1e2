//! Runtime start parameters and persisted configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Parameters handed to the runtime by the injecting caller.
///
/// Immutable for the process lifetime. Paths are not validated up front;
/// a bad path surfaces as the owning subsystem's construction error.
#[derive(Debug, Clone)]
pub struct StartInfo {
    /// Working directory of the runtime installation.
    pub working_dir: PathBuf,
    /// Directory holding game data tables and localization files.
    pub asset_dir: PathBuf,
    /// Primary third-party extension directory.
    pub plugin_dir: PathBuf,
    /// Fallback extension directory (default profile).
    pub default_plugin_dir: PathBuf,
    /// Path of the persisted configuration document.
    pub config_path: PathBuf,
    /// Requested language tag (e.g. "en", "de", "ja").
    pub language: String,
    /// Version tag of the host executable.
    pub host_version: String,
    /// Whether the user opted out of telemetry.
    pub no_telemetry: bool,
}

/// Toggles resolved by the caller and passed into `start()` once.
#[derive(Debug, Clone, Copy)]
pub struct StartOptions {
    /// Construct and enable the overlay renderer.
    pub load_overlay: bool,
    /// Run extension catalog cleanup and load extensions.
    pub load_plugins: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            load_overlay: true,
            load_plugins: true,
        }
    }
}

/// Persisted key-value configuration document.
///
/// Loaded once at the beginning of startup. Settings flows elsewhere may
/// rewrite the file; the supervisor itself never writes after load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Overrides the host UI culture when choosing the runtime language.
    #[serde(default)]
    pub language_override: Option<String>,
    /// Milliseconds to wait between extension loads.
    #[serde(default)]
    pub plugin_wait_ms: u64,
    /// Persisted copy of the telemetry opt-out.
    #[serde(default)]
    pub opt_out_telemetry: bool,
}

impl Configuration {
    /// Load the configuration document.
    ///
    /// A missing file yields defaults; a present but malformed file is an
    /// error (the document exists, so silently discarding it would lose
    /// user settings).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&content).map_err(|e| Error::ConfigMalformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save the configuration document.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::load(dir.path().join("nope.json")).unwrap();
        assert!(config.language_override.is_none());
        assert!(!config.opt_out_telemetry);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Configuration::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigMalformed { .. }));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Configuration {
            language_override: Some("de".to_string()),
            plugin_wait_ms: 250,
            opt_out_telemetry: true,
        };
        config.save(&path).unwrap();

        let loaded = Configuration::load(&path).unwrap();
        assert_eq!(loaded.language_override.as_deref(), Some("de"));
        assert_eq!(loaded.plugin_wait_ms, 250);
        assert!(loaded.opt_out_telemetry);
    }
}
