// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph settings, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default number of history snapshots kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Default extension of saved graph documents
pub const DEFAULT_FILE_EXTENSION: &str = "flow";

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// The file was written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Tunables of a graph and its documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Settings format version
    pub version: u32,
    /// Maximum number of history snapshots; oldest are dropped first
    pub max_history: usize,
    /// Pretty-print saved documents
    pub pretty_json: bool,
    /// Extension appended to saved documents that lack one
    pub file_extension: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            max_history: DEFAULT_MAX_HISTORY,
            pretty_json: true,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
        }
    }
}

impl GraphSettings {
    /// Parse settings from RON text
    pub fn from_ron(s: &str) -> Result<Self, SettingsError> {
        let settings: GraphSettings = ron::from_str(s)?;
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        Ok(settings)
    }

    /// Render settings as RON text
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
