//! Multimodal file embedding index.
//!
//! Files are classified as text, image or video, turned into one fixed-length
//! vector each, and stored so a free-text query can find the closest files
//! across all three modalities.

pub mod aggregate;
pub mod chunker;
pub mod classify;
pub mod config;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod models;
pub mod providers;
pub mod scanner;
pub mod search;
pub mod store;

#[cfg(test)]
mod testing;

pub use embedder::{EmbedOptions, ModalityEmbedder};
pub use error::{IndexError, Result};
pub use indexer::Indexer;
pub use models::{BatchOutcome, FileDescriptor, IndexRecord, Modality, SearchResult};
pub use scanner::FolderScanner;
pub use search::Searcher;
pub use store::{IndexStore, MemoryStore, SurrealStore};
