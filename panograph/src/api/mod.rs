//! Interfaces to the external collaborators of the graph: the remote
//! metadata source and the asset transport, plus the record shapes they
//! exchange.

mod asset;
#[cfg(test)]
pub(crate) mod mock;
mod source;
mod types;

pub use asset::{AssetLoader, ProgressCallback};
pub use source::{DataSource, DataSourceError, TileNodes, MAX_KEYS_PER_REQUEST};
pub use types::{
    CoreNodeRecord, FillNodeRecord, FullNodeRecord, PanoramaRecord, ProjectRecord,
    SequenceRecord, UserRecord,
};
