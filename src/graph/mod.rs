//! Property graph for the ticket domain
//!
//! Pure Rust implementation using petgraph + redb. The store exposes the
//! narrow command surface the rest of the engine consumes: merge-by-key
//! node and edge upserts, kind-restricted edge deletion, cascade node
//! deletion, and kind-filtered queries and counts.

pub mod store;
pub mod store_models;

pub use store::GraphStore;
pub use store_models::{EdgeKind, GraphEdge, GraphNode, NodeKind};
