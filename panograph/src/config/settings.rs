//! Settings structs for the sections of `config.ini`.

use crate::graph::{
    GraphConfig, DEFAULT_MAX_SEQUENCES, DEFAULT_MAX_UNUSED_NODES,
    DEFAULT_MAX_UNUSED_PRE_STORED_NODES, DEFAULT_MAX_UNUSED_TILES,
};
use crate::logging::{default_log_dir, default_log_file};
use std::path::{Path, PathBuf};

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFile {
    /// Graph eviction thresholds
    pub graph: GraphSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[graph]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    pub max_sequences: usize,
    pub max_unused_nodes: usize,
    pub max_unused_pre_stored_nodes: usize,
    pub max_unused_tiles: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_sequences: DEFAULT_MAX_SEQUENCES,
            max_unused_nodes: DEFAULT_MAX_UNUSED_NODES,
            max_unused_pre_stored_nodes: DEFAULT_MAX_UNUSED_PRE_STORED_NODES,
            max_unused_tiles: DEFAULT_MAX_UNUSED_TILES,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: Path::new(default_log_dir()).join(default_log_file()),
        }
    }
}

impl LoggingSettings {
    /// Directory and file name for [`init_logging`](crate::logging::init_logging).
    pub fn dir_and_file(&self) -> (String, String) {
        let dir = self
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        let file = self
            .file
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| default_log_file().to_string());
        (dir, file)
    }
}

impl ConfigFile {
    /// Eviction thresholds for [`Graph`](crate::graph::Graph).
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::default()
            .with_max_sequences(self.graph.max_sequences)
            .with_max_unused_nodes(self.graph.max_unused_nodes)
            .with_max_unused_pre_stored_nodes(self.graph.max_unused_pre_stored_nodes)
            .with_max_unused_tiles(self.graph.max_unused_tiles)
    }
}
