//! Vector index and thresholded retrieval

mod index;
mod retriever;

pub use index::{FlatIndex, IndexManifest, INDEX_FORMAT_VERSION};
pub use retriever::{filter_by_distance, ChunkRetriever, Retriever};
