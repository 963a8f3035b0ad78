use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Last-used selections, remembered between runs. Never needed for
/// correctness: anything missing or unreadable falls back to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub character: Option<String>,
    pub template_folder: Option<String>,
    pub destination: Option<String>,
    pub bank: Option<String>,
    pub bus: Option<String>,
    pub asset_folder: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| toml::from_str::<Settings>(&text).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io = |source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(io)?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Overwrite fields with any value `other` provides.
    pub fn merge(&mut self, other: Settings) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.project, other.project);
        take(&mut self.audio_dir, other.audio_dir);
        take(&mut self.prefix, other.prefix);
        take(&mut self.character, other.character);
        take(&mut self.template_folder, other.template_folder);
        take(&mut self.destination, other.destination);
        take(&mut self.bank, other.bank);
        take(&mut self.bus, other.bus);
        take(&mut self.asset_folder, other.asset_folder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.toml");
        let settings = Settings {
            prefix: Some("Mechaflora".into()),
            character: Some("Weak_Ranged".into()),
            destination: Some("event:/SFX/Enemies".into()),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_missing_or_corrupt_settings_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        assert_eq!(Settings::load(&path), Settings::default());

        std::fs::write(&path, "prefix = [").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base = Settings {
            prefix: Some("Old".into()),
            bank: Some("Enemies".into()),
            ..Default::default()
        };
        base.merge(Settings {
            prefix: Some("New".into()),
            ..Default::default()
        });
        assert_eq!(base.prefix.as_deref(), Some("New"));
        assert_eq!(base.bank.as_deref(), Some("Enemies"));
    }
}
