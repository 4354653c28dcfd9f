use std::fmt;

/// Which edges navigation uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GraphMode {
    /// Spatial and sequence edges are cached
    #[default]
    Spatial,
    /// Only sequence edges are cached
    Sequence,
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphMode::Spatial => write!(f, "spatial"),
            GraphMode::Sequence => write!(f, "sequence"),
        }
    }
}
