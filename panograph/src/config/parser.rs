//! INI parsing: the single place where INI key names map to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [graph] section
    if let Some(section) = ini.section(Some("graph")) {
        let graph = &mut config.graph;
        for (key, field) in [
            ("max_sequences", &mut graph.max_sequences),
            ("max_unused_nodes", &mut graph.max_unused_nodes),
            (
                "max_unused_pre_stored_nodes",
                &mut graph.max_unused_pre_stored_nodes,
            ),
            ("max_unused_tiles", &mut graph.max_unused_tiles),
        ] {
            if let Some(v) = section.get(key) {
                *field = parse_count("graph", key, v)?;
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_count(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a non-negative integer".to_string(),
        })
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
