use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use crate::error::StoreError;

const APP_DIR: &str = ".daily-term";
const DATABASE_NAME: &str = "database";

/// Wire encoding of the database file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Cbor,
}

impl WireFormat {
    pub fn extension(self) -> &'static str {
        match self {
            WireFormat::Json => "json",
            WireFormat::Cbor => "cbor",
        }
    }
}

impl std::str::FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(WireFormat::Json),
            "cbor" => Ok(WireFormat::Cbor),
            _ => Err(format!("unknown wire format: {}", s)),
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub format: WireFormat,
    pub path: Option<PathBuf>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("daily-term").join("config.toml"))
}

/// `~/.daily-term/database.<ext>`.
pub fn default_database_path(format: WireFormat) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(APP_DIR)
        .join(format!("{DATABASE_NAME}.{}", format.extension()))
}

impl StoreConfig {
    /// Reads the user's config file, falling back to defaults when it is
    /// missing or malformed.
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Reads the config file at `path` with the same fallbacks as [`load`].
    ///
    /// [`load`]: StoreConfig::load
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        Self::from_toml_str(&content).unwrap_or_else(|err| {
            warn!("ignoring {}: {err}", path.display());
            Self::default()
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, StoreError> {
        Ok(toml::from_str(content)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_database_path(self.format))
    }
}
