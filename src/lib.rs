//! # vectordb-server
//!
//! Serves a pre-built, read-only nearest-neighbor index over gRPC
//! (`vectordb.v1.SearchService`) and an HTTP/JSON gateway that transcodes to it.
//!
//! This library provides:
//! - Metrics (squared L2, inner product) and best-first ordering rules
//! - Flat and HNSW indexes behind one `Index` trait, plus the index file format
//! - The shared `IndexHandle`, request validation and the gRPC service
//! - The HTTP gateway and the process lifecycle that ties them together
//!
//! ## Example
//!
//! ```rust
//! use vectordb_server::{FlatIndex, IndexHandle, MetricType};
//!
//! let vectors = vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
//! let index = FlatIndex::from_vectors(MetricType::L2, 2, vectors).unwrap();
//! let handle = IndexHandle::from_index("example", Box::new(index));
//!
//! let result = handle.search(1, &[0.0, 0.0], 2).unwrap();
//! assert_eq!(result.ids, vec![0, 1]);
//! assert_eq!(result.distances, vec![0.0, 2.0]);
//! ```

pub mod builder;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod index;
pub mod metric;
pub mod rpc;
pub mod server;
pub mod service;
pub mod validate;

pub use error::{Result, VectorDbError};
pub use handle::{IndexHandle, IndexMetadata, SearchResult, SENTINEL_ID};
pub use index::{FlatIndex, HnswIndex, HnswParams, Index, IndexKind};
pub use metric::MetricType;
pub use service::SearchServiceImpl;
