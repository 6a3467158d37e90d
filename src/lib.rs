//! A similarity-search index for fuzzy-hash fingerprints (TLSH and
//! ssdeep strings), built as a Hierarchical Navigable Small World graph
//! (Malkov & Yashunin).
//!
//! This crate provides:
//! - [`graph::GraphCore`]: insertion, deletion and k-NN / threshold search
//!   over a layered HNSW graph
//! - [`metric::DistanceMetric`]: the similarity/spatial metric abstraction
//!   that lets one priority-queue ordering serve both TLSH distances and
//!   ssdeep similarity scores
//! - [`persistence`]: a CRC32-verified, optionally gzip-compressed binary
//!   snapshot format
//! - [`facade::IndexFacade`]: the composition point wiring a graph to an
//!   externally supplied record store and prefix index
//!
//! ## Example
//!
//! ```rust
//! use fuzzy_hnsw_index::graph::{GraphConfig, GraphCore};
//! use fuzzy_hnsw_index::metric::DistanceMetric;
//! use fuzzy_hnsw_index::record::HashRecord;
//!
//! let config = GraphConfig::new(16, 200, 16, 32, DistanceMetric::Ssdeep);
//! let mut graph = GraphCore::with_seed(config, 42);
//!
//! let record = HashRecord::new("3:AXGBicFlgVNhBGcL6:AXGHsNhxLl", DistanceMetric::Ssdeep, 1);
//! graph.insert(record).unwrap();
//! ```

pub mod error;
pub mod external;
pub mod facade;
pub mod graph;
mod neighbor_queue;
pub mod metric;
pub mod persistence;
pub mod record;

pub use error::{ApoError, Result};
pub use facade::IndexFacade;
pub use graph::{GraphConfig, GraphCore, GroupedResults};
pub use metric::DistanceMetric;
pub use record::HashRecord;
