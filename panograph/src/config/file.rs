//! The panograph INI file.
//!
//! Lives at `~/.panograph/config.ini` unless a path is given. Two sections
//! are read:
//!
//! ```ini
//! [graph]
//! max_sequences = 50
//! max_unused_nodes = 100
//! max_unused_pre_stored_nodes = 30
//! max_unused_tiles = 20
//!
//! [logging]
//! file = logs/panograph.log
//! ```
//!
//! Keys left out keep their defaults, and a missing file yields
//! [`ConfigFile::default`]. Unknown sections and keys are ignored.

use ini::Ini;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use super::settings::*;

const DIRECTORY_NAME: &str = ".panograph";
const FILE_NAME: &str = "config.ini";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("config file is not valid INI: {0}")]
    Parse(#[from] ini::Error),

    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("[{section}] {key} = '{value}' rejected: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("cannot create {}: {source}", path.display())]
    CreateDirectory { path: PathBuf, source: io::Error },
}

impl ConfigFile {
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Reads `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        super::parser::parse_ini(&Ini::load_from_file(path)?)
    }

    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Writes every setting to `path`, creating missing parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| ConfigFileError::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, super::writer::to_config_string(self)).map_err(|source| {
            ConfigFileError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// `~/.panograph`, or `./.panograph` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DIRECTORY_NAME)
}

pub fn config_file_path() -> PathBuf {
    config_directory().join(FILE_NAME)
}
