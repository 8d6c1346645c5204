//! Deskgraph - graph-powered ticket management engine
//!
//! Tickets, people, categories, SLAs and knowledge articles live in a
//! property graph. Three subsystems do the real work:
//!
//! 1. The relationship synchronizer derives typed edges from scalar
//!    reference fields and keeps the graph consistent as entities change.
//! 2. The classification gateway drives an external scoring service,
//!    applying results automatically only above a confidence threshold.
//! 3. The search facade ranks entities by lexical relevance and finds
//!    related tickets by word-set similarity.
//!
//! Scalar fields are always the source of truth; edges are a derived
//! index that can be rebuilt at any time with `reinitialize_all`.

pub mod classify;
pub mod config;
pub mod graph;
pub mod models;
pub mod relevance;
pub mod search;
pub mod sync;
