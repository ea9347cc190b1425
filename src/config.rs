//! Engine configuration.
//!
//! Two inputs meet here: the [`AppConfig`] the embedding application passes
//! at runtime (release version, baseline artifact paths, cache directory)
//! and the [`Settings`] document compiled into the app (update service
//! endpoint, channel, trust material). [`UpdateConfig::resolve`] validates
//! both once at init; the resolved config is immutable for the process
//! lifetime.

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_CHANNEL, DOWNLOADS_DIR_NAME};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Runtime configuration supplied by the embedding application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Named version of the installed app build. Patches are scoped to it.
    /// Opaque to the engine: a version string or a content hash both work.
    pub release_version: String,
    /// Paths to the bundled baseline executable, in preference order.
    /// Used as the input for diff-encoded artifacts and as the rollback
    /// floor; at least one entry is required.
    pub original_artifact_paths: Vec<String>,
    /// Directory where the engine keeps its state document and artifacts.
    pub cache_dir: String,
}

/// The compiled-in settings document, parsed from YAML.
///
/// Unrecognized keys are ignored so that older engines tolerate newer
/// settings files.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Application identifier registered with the update service. Required.
    pub app_id: String,
    /// Release channel. Defaults to "stable".
    pub channel: Option<String>,
    /// Update service base URL. Defaults to the production endpoint.
    pub base_url: Option<String>,
    /// Whether the host should run the updater automatically on launch.
    /// Defaults to true.
    pub auto_update: Option<bool>,
    /// Base64-encoded public key for artifact signature checks. Carried
    /// opaquely; absent means checksum-only verification.
    pub patch_public_key: Option<String>,
}

impl Settings {
    /// Parses the settings document from its YAML source.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            field: "settings".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Validated, immutable engine configuration.
///
/// Built once by [`UpdateConfig::resolve`]; every component reads from it
/// and nothing writes to it after init.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub release_version: String,
    pub baseline_paths: Vec<PathBuf>,
    pub cache_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub app_id: String,
    pub channel: String,
    pub base_url: String,
    pub auto_update: bool,
    pub patch_public_key: Option<String>,
}

impl UpdateConfig {
    /// Validates the caller-supplied config against the parsed settings and
    /// produces the immutable engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the release version is empty, no
    /// baseline path was given, or the cache directory cannot be created.
    pub fn resolve(app: AppConfig, settings: Settings) -> Result<Self> {
        if app.release_version.trim().is_empty() {
            return Err(Error::Config {
                field: "release_version".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if app.original_artifact_paths.is_empty() {
            return Err(Error::Config {
                field: "original_artifact_paths".to_string(),
                reason: "at least one baseline path is required".to_string(),
            });
        }

        let cache_dir = PathBuf::from(&app.cache_dir);
        // Creating the directory doubles as the writability probe: an
        // unwritable location fails init here rather than at first save.
        fs::create_dir_all(&cache_dir).map_err(|e| Error::Config {
            field: "cache_dir".to_string(),
            reason: format!("{}: {e}", cache_dir.display()),
        })?;
        let downloads_dir = cache_dir.join(DOWNLOADS_DIR_NAME);

        Ok(Self {
            release_version: app.release_version,
            baseline_paths: app
                .original_artifact_paths
                .iter()
                .map(PathBuf::from)
                .collect(),
            cache_dir,
            downloads_dir,
            app_id: settings.app_id,
            channel: settings
                .channel
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            base_url: settings
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auto_update: settings.auto_update.unwrap_or(true),
            patch_public_key: settings.patch_public_key,
        })
    }
}

/// Architecture name reported to the update service.
pub fn current_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "arm") {
        "arm"
    } else {
        "unknown"
    }
}

/// Platform name reported to the update service.
pub fn current_platform() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "android") {
        "android"
    } else if cfg!(target_os = "ios") {
        "ios"
    } else {
        "unknown"
    }
}
