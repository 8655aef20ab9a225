//! Per-overlay configuration documents
//!
//! One JSON file per overlay name under the user's config directory. A
//! missing file yields compiled-in defaults (and writes them out); a
//! corrupt file yields defaults with a warning and stays on disk so the
//! user can inspect what went wrong.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Global HUD options shared by every overlay
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HudOptions {
    /// Render overlays with synthetic data even without a simulator
    pub demo_mode: bool,
}

/// Root directory for trackside configuration files
pub fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trackside")
}

fn overlay_config_path(root: &Path, name: &str) -> PathBuf {
    let file = name.to_lowercase().replace(' ', "_");
    root.join("overlays").join(format!("{file}.json"))
}

/// Load an overlay's settings document from `root`
pub fn load_overlay_config_from<T>(root: &Path, name: &str) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let path = overlay_config_path(root, name);

    match fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                // Leave the file in place so the user can investigate
                warn!(overlay = name, path = %path.display(), error = %e,
                    "overlay settings are corrupt, using defaults");
                T::default()
            }
        },
        Err(_) => {
            debug!(overlay = name, "no settings on disk, writing defaults");
            let defaults = T::default();
            if let Err(e) = save_overlay_config_to(root, name, &defaults) {
                debug!(overlay = name, error = %e, "could not persist defaults");
            }
            defaults
        }
    }
}

/// Persist an overlay's settings document under `root`
pub fn save_overlay_config_to<T: Serialize>(root: &Path, name: &str, config: &T) -> Result<()> {
    let path = overlay_config_path(root, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Load from the default configuration root
pub fn load_overlay_config<T>(name: &str) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    load_overlay_config_from(&config_root(), name)
}

/// Save to the default configuration root
pub fn save_overlay_config<T: Serialize>(name: &str, config: &T) -> Result<()> {
    save_overlay_config_to(&config_root(), name, config)
}
