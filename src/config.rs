use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::bridge::ToolInvocation;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Project opened when a command is given no `--project`.
    pub project: Option<PathBuf>,
    /// External authoring tool used by `request --run`.
    pub tool: ToolConfig,
    /// Names preselected when a command leaves them out.
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    /// Extra arguments placed before `--request`/`--result`.
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "fmodstudiocl".to_string(),
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DefaultsConfig {
    pub bank: Option<String>,
    pub bus: Option<String>,
    pub asset_folder: Option<String>,
}

impl AppConfig {
    /// Load config from `~/.config/eventforge/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn tool_invocation(&self) -> ToolInvocation {
        ToolInvocation {
            program: self.tool.program.clone(),
            args: self.tool.args.clone(),
            timeout: Duration::from_secs(self.tool.timeout_secs.max(1)),
        }
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Where last-used selections are remembered, under the XDG data directory.
pub fn default_settings_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().join("settings.toml")
    } else {
        PathBuf::from("eventforge-settings.toml")
    }
}
