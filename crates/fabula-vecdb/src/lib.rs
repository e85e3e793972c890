//! # fabula-vecdb
//!
//! Persistent vector store and exact similarity search for fable corpora.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fabula_vecdb::{HashEmbedder, QueryEngine, StoreConfig, VectorStore};
//!
//! let embedder = Arc::new(HashEmbedder::new(256)?);
//! let store = VectorStore::open("fabula.sqlite3", StoreConfig::default(), embedder)?;
//! let engine = QueryEngine::from_store(&store)?;
//! for hit in engine.query_text("a fox and some grapes", 5)? {
//!     println!("{:.4} {}", hit.distance, hit.entry.metadata.title);
//! }
//! # Ok::<(), fabula_vecdb::VecDbError>(())
//! ```

pub mod embedding;
pub mod error;
pub mod http;
pub mod metric;
pub mod query;
pub mod store;

pub use embedding::{Embedder, HashEmbedder};
pub use error::{Result, VecDbError};
pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use metric::DistanceMetric;
pub use query::{Match, QueryEngine, QueryInput};
pub use store::{
    default_store_path, EntryMetadata, IndexedEntry, NewEntry, StoreConfig, VectorStore,
    DEFAULT_COLLECTION, DEFAULT_MAX_BATCH_SIZE,
};
