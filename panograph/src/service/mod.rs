//! Service layer over the graph: the per-node caching pipeline, graph
//! mode and image loading progress.

mod graph_service;
mod image_loading;
mod mode;

pub use graph_service::GraphService;
pub use image_loading::{ImageLoadingService, LoadStatusMap};
pub use mode::GraphMode;
