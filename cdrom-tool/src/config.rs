//! TOML configuration, one `[[cdrom]]` table per drive to mount.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Path to the drive's `.cue` sheet.
    pub path: PathBuf,
    /// Whether to mount non-HFS discs (no `Apple_HFS` partition map
    /// entry found). Matches the original's `mount_non_hfs` preference.
    #[serde(default = "true_fn")]
    pub mount_non_hfs: bool,
}

fn true_fn() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "cdrom", default)]
    pub drives: Vec<DriveConfig>,
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
