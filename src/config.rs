//! User settings for command-runner.
//!
//! Settings live in `settings.json` under the user config directory
//! (`~/.config/command-runner/settings.json` on Linux) unless a path is given
//! on the command line. Every key is optional:
//!
//! ```json
//! {
//!   "maxCustomNameLength": 50,
//!   "maxDisplayLength": 15,
//!   "confirmDangerousCommands": true,
//!   "refreshInterval": 10,
//!   "showHoverInfo": true,
//!   "tmuxPath": "tmux"
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "command-runner";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Display names longer than this are cut down and end in `...`
    pub max_custom_name_length: usize,
    /// Commands longer than this are shortened in labels
    pub max_display_length: usize,
    /// Ask before running commands that look destructive
    pub confirm_dangerous_commands: bool,
    /// Seconds between rescans of the file and time-ago refreshes
    pub refresh_interval: u64,
    /// Show execution details for the selected annotation
    pub show_hover_info: bool,
    /// tmux binary used as the session host
    pub tmux_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_custom_name_length: 50,
            max_display_length: 15,
            confirm_dangerous_commands: true,
            refresh_interval: 10,
            show_hover_info: true,
            tmux_path: "tmux".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing file means defaults; a file that exists but cannot be read or
    /// parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }
}
