//! # docsearch
//!
//! Session-scoped document search: uploaded documents are chunked, embedded
//! into L2-normalized vectors and held in an exact inner-product index,
//! persisted next to their metadata and queried by cosine similarity.
//!
//! This library provides:
//! - Contiguous vector storage and an exact flat index
//! - A lock-guarded session store keeping vectors and metadata aligned
//! - Crash-safe persistence of the session pair
//! - Pluggable embedding providers and ingestion pipelines
//! - An HTTP API over a single shared session
//!
//! ## Example
//!
//! ```rust
//! use docsearch::{ChunkSource, HashingEmbedder, SessionStore};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = SessionStore::new(dir.path());
//! let embedder = HashingEmbedder::new(384).unwrap();
//!
//! let texts = vec!["Rent is due on the first of the month.".to_string()];
//! let sources = vec![ChunkSource::new("lease.pdf", 1)];
//! store.add_batch(&texts, &sources, &embedder).unwrap();
//!
//! let hits = store.search("when is rent due", 3, &embedder).unwrap();
//! assert_eq!(hits[0].record.page_number, 1);
//! ```

pub mod buffer;
pub mod config;
pub mod embedding;
pub mod error;
pub mod flat_index;
pub mod ingestion;
pub mod metadata;
pub mod metrics;
pub mod neighbor_queue;
pub mod persistence;
pub mod server;
pub mod session;
pub mod vector;

pub use buffer::VectorBuffer;
pub use config::ServiceConfig;
pub use embedding::{EmbeddingProvider, HashingEmbedder};
pub use error::{Result, SessionError};
pub use flat_index::FlatIndex;
pub use ingestion::{Chunk, IngestionPipeline, TextPipeline, TextSplitter};
pub use metadata::{MetadataRecord, MetadataStore};
pub use session::{BatchOutcome, ChunkSource, SearchHit, SessionPhase, SessionStore};
pub use vector::Vector;
