pub mod chunker;
pub mod store;

pub use store::{IndexError, IndexManifest, IndexStore, VectorIndex};
