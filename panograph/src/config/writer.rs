//! INI serialization: the commented representation written to `config.ini`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[graph]
; Sequences kept in memory, least recently used evicted first (default: 50)
max_sequences = {}
; Nodes with loaded images kept when not in use (default: 100)
max_unused_nodes = {}
; Fetched nodes without images kept outside of cached tiles (default: 30)
max_unused_pre_stored_nodes = {}
; Tiles kept when no node in them is in use (default: 20)
max_unused_tiles = {}

[logging]
; Log file path, cleared at startup
file = {}
"#,
        config.graph.max_sequences,
        config.graph.max_unused_nodes,
        config.graph.max_unused_pre_stored_nodes,
        config.graph.max_unused_tiles,
        config.logging.file.to_string_lossy(),
    )
}
