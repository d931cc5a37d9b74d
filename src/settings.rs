//
// settings.rs
// dicom-batch
//
// Persists the last folder chosen for each role as a small JSON document in the user's config directory.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const APP_DIR: &str = "dicom-batch";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine the user config directory")]
    NoConfigDir,

    #[error("failed to access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings document: {0}")]
    Json(#[from] serde_json::Error),
}

/// The five folders an operator can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderRole {
    Input,
    DicomOutput,
    ImageOutput,
    InfoOutput,
    Log,
}

impl FolderRole {
    pub const ALL: [FolderRole; 5] = [
        FolderRole::Input,
        FolderRole::DicomOutput,
        FolderRole::ImageOutput,
        FolderRole::InfoOutput,
        FolderRole::Log,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FolderRole::Input => "input",
            FolderRole::DicomOutput => "DICOM output",
            FolderRole::ImageOutput => "image output",
            FolderRole::InfoOutput => "info output",
            FolderRole::Log => "log",
        }
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Last-used folder per role. Unset roles are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default)]
    pub dicom_output: Option<PathBuf>,
    #[serde(default)]
    pub image_output: Option<PathBuf>,
    #[serde(default)]
    pub info_output: Option<PathBuf>,
    #[serde(default)]
    pub log: Option<PathBuf>,
}

impl Settings {
    /// Default location: `<config dir>/dicom-batch/settings.json`.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Loads the document, falling back to empty settings when it is absent or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|err| {
            warn!("Ignoring settings file: {}", err);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn folder(&self, role: FolderRole) -> Option<&Path> {
        self.slot(role).as_deref()
    }

    pub fn set_folder(&mut self, role: FolderRole, path: PathBuf) {
        *self.slot_mut(role) = Some(path);
    }

    fn slot(&self, role: FolderRole) -> &Option<PathBuf> {
        match role {
            FolderRole::Input => &self.input,
            FolderRole::DicomOutput => &self.dicom_output,
            FolderRole::ImageOutput => &self.image_output,
            FolderRole::InfoOutput => &self.info_output,
            FolderRole::Log => &self.log,
        }
    }

    fn slot_mut(&mut self, role: FolderRole) -> &mut Option<PathBuf> {
        match role {
            FolderRole::Input => &mut self.input,
            FolderRole::DicomOutput => &mut self.dicom_output,
            FolderRole::ImageOutput => &mut self.image_output,
            FolderRole::InfoOutput => &mut self.info_output,
            FolderRole::Log => &mut self.log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_keep_every_role() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("nested/settings.json");

        let mut settings = Settings::default();
        for role in FolderRole::ALL {
            settings.set_folder(role, dir.path().join(role.label()));
        }
        settings.save(&path).expect("save");

        let loaded = Settings::load(&path).expect("load");
        assert_eq!(loaded, settings);
        assert_eq!(
            loaded.folder(FolderRole::ImageOutput),
            Some(dir.path().join("image output").as_path())
        );
    }

    #[test]
    fn missing_or_broken_documents_fall_back_to_defaults() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load_or_default(&path), Settings::default());

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Json(_))));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn partial_documents_are_accepted() {
        let dir = tempdir().expect("tmpdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"input": "/data/in"}"#).unwrap();

        let loaded = Settings::load_or_default(&path);
        assert_eq!(loaded.folder(FolderRole::Input), Some(Path::new("/data/in")));
        assert_eq!(loaded.folder(FolderRole::Log), None);
    }
}
