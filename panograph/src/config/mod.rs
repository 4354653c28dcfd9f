//! User configuration stored in `~/.panograph/config.ini`.
//!
//! ```no_run
//! use panograph::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let graph_config = config.graph_config();
//! # Ok::<(), panograph::config::ConfigFileError>(())
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, GraphSettings, LoggingSettings};
