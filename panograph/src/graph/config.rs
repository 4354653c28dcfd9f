//! Eviction thresholds of the graph.

/// Default number of sequences kept when unused.
pub const DEFAULT_MAX_SEQUENCES: usize = 50;
/// Default number of unused cache-initialized nodes kept.
pub const DEFAULT_MAX_UNUSED_NODES: usize = 100;
/// Default number of unused pre-stored nodes kept.
pub const DEFAULT_MAX_UNUSED_PRE_STORED_NODES: usize = 30;
/// Default number of unused tiles kept.
pub const DEFAULT_MAX_UNUSED_TILES: usize = 20;

/// Limits applied by [`Graph::uncache`](super::Graph::uncache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Sequences kept, least recently accessed evicted first
    pub max_sequences: usize,
    /// Cache-initialized nodes whose assets are kept
    pub max_unused_nodes: usize,
    /// Full nodes without assets kept outside of cached tiles
    pub max_unused_pre_stored_nodes: usize,
    /// Cached tiles kept
    pub max_unused_tiles: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_sequences: DEFAULT_MAX_SEQUENCES,
            max_unused_nodes: DEFAULT_MAX_UNUSED_NODES,
            max_unused_pre_stored_nodes: DEFAULT_MAX_UNUSED_PRE_STORED_NODES,
            max_unused_tiles: DEFAULT_MAX_UNUSED_TILES,
        }
    }
}

impl GraphConfig {
    pub fn with_max_sequences(mut self, value: usize) -> Self {
        self.max_sequences = value;
        self
    }

    pub fn with_max_unused_nodes(mut self, value: usize) -> Self {
        self.max_unused_nodes = value;
        self
    }

    pub fn with_max_unused_pre_stored_nodes(mut self, value: usize) -> Self {
        self.max_unused_pre_stored_nodes = value;
        self
    }

    pub fn with_max_unused_tiles(mut self, value: usize) -> Self {
        self.max_unused_tiles = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.max_sequences, 50);
        assert_eq!(config.max_unused_nodes, 100);
        assert_eq!(config.max_unused_pre_stored_nodes, 30);
        assert_eq!(config.max_unused_tiles, 20);
    }

    #[test]
    fn test_builder() {
        let config = GraphConfig::default()
            .with_max_sequences(1)
            .with_max_unused_tiles(0);
        assert_eq!(config.max_sequences, 1);
        assert_eq!(config.max_unused_tiles, 0);
        assert_eq!(config.max_unused_nodes, DEFAULT_MAX_UNUSED_NODES);
    }
}
