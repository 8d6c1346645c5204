//! Property-graph storage using petgraph + redb
//!
//! Nodes are indexed by their stable string id. All edge writes are
//! merge-by-key upserts: at most one edge of a given kind exists between
//! an ordered pair of nodes, so re-running synchronization never
//! duplicates relationships.

use anyhow::{Context, Result};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

pub use super::store_models::{EdgeKind, GraphEdge, GraphNode, NodeKind};

/// In-process property-graph store.
///
/// A `StableDiGraph` keeps node and edge indices valid across removals,
/// which this engine relies on: resynchronization deletes and recreates
/// edges constantly, and node deletion cascades to incident edges.
pub struct GraphStore {
    /// In-memory graph
    graph: RwLock<StableDiGraph<GraphNode, GraphEdge>>,
    /// Node lookup by entity id
    node_index: RwLock<HashMap<String, NodeIndex>>,
    /// Persistence layer (optional)
    db: Option<redb::Database>,
}

// redb table definitions
const NODES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("nodes");
const EDGES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("edges");

impl GraphStore {
    /// Create or open a graph store at the given path
    pub fn new(db_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;

        let db_file = db_path.join("graph.redb");
        let db = redb::Database::create(&db_file).context("Failed to open redb database")?;

        let store = Self {
            graph: RwLock::new(StableDiGraph::new()),
            node_index: RwLock::new(HashMap::new()),
            db: Some(db),
        };

        store.load()?;

        Ok(store)
    }

    /// Create an in-memory only store (no persistence)
    pub fn in_memory() -> Self {
        Self {
            graph: RwLock::new(StableDiGraph::new()),
            node_index: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    // ==================== Lock Helpers ====================
    //
    // RwLock poisoning means a thread panicked while holding the lock,
    // leaving the protected data in a potentially inconsistent state.
    // That is unrecoverable here, so these helpers centralise the
    // `.expect()` calls. Writers always take the graph lock before the
    // index lock.

    fn read_graph(&self) -> std::sync::RwLockReadGuard<'_, StableDiGraph<GraphNode, GraphEdge>> {
        self.graph
            .read()
            .expect("graph lock poisoned — a thread panicked while holding this lock")
    }

    fn write_graph(&self) -> std::sync::RwLockWriteGuard<'_, StableDiGraph<GraphNode, GraphEdge>> {
        self.graph
            .write()
            .expect("graph lock poisoned — a thread panicked while holding this lock")
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, NodeIndex>> {
        self.node_index
            .read()
            .expect("index lock poisoned — a thread panicked while holding this lock")
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, NodeIndex>> {
        self.node_index
            .write()
            .expect("index lock poisoned — a thread panicked while holding this lock")
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        let mut graph = self.write_graph();
        let mut index = self.write_index();

        graph.clear();
        index.clear();

        if let Some(ref db) = self.db {
            let write_txn = db.begin_write()?;
            let _ = write_txn.delete_table(NODES_TABLE);
            let _ = write_txn.delete_table(EDGES_TABLE);
            write_txn.commit()?;
        }

        Ok(())
    }

    // ==================== Node Operations ====================

    /// Upsert a node, keyed by its id. An existing node is replaced
    /// wholesale; its edges are untouched.
    pub fn upsert_node(&self, node: GraphNode) -> NodeIndex {
        let mut graph = self.write_graph();
        let mut index = self.write_index();

        let id = node.id.clone();

        if let Some(&idx) = index.get(&id) {
            if let Some(existing) = graph.node_weight_mut(idx) {
                *existing = node;
            }
            return idx;
        }

        let idx = graph.add_node(node);
        index.insert(id, idx);
        idx
    }

    /// Get node by id
    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        let graph = self.read_graph();
        let index = self.read_index();

        index.get(id).and_then(|&idx| graph.node_weight(idx).cloned())
    }

    /// Get all nodes of a specific kind
    pub fn get_nodes_by_kind(&self, kind: NodeKind) -> Vec<GraphNode> {
        let graph = self.read_graph();

        graph
            .node_weights()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }

    /// Update a node's property
    pub fn update_node_property(
        &self,
        id: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> bool {
        let mut graph = self.write_graph();
        let index = self.read_index();
        if let Some(&idx) = index.get(id) {
            if let Some(node) = graph.node_weight_mut(idx) {
                node.set_property(key, value);
                return true;
            }
        }
        false
    }

    /// Update multiple properties on a node
    pub fn update_node_properties(&self, id: &str, props: &[(&str, serde_json::Value)]) -> bool {
        let mut graph = self.write_graph();
        let index = self.read_index();
        if let Some(&idx) = index.get(id) {
            if let Some(node) = graph.node_weight_mut(idx) {
                for (key, value) in props {
                    node.set_property(key, value.clone());
                }
                return true;
            }
        }
        false
    }

    /// Delete a node. Incident edges of every kind are removed with it.
    pub fn delete_node(&self, id: &str) -> bool {
        let mut graph = self.write_graph();
        let mut index = self.write_index();

        match index.remove(id) {
            Some(idx) => graph.remove_node(idx).is_some(),
            None => false,
        }
    }

    // ==================== Edge Operations ====================

    /// Upsert an edge between two nodes, keyed by (from, kind, to).
    ///
    /// Returns `true` only when a new edge was inserted; an existing edge
    /// of the same kind between the pair has its attributes replaced and
    /// returns `false`. Missing endpoints also return `false` — the
    /// caller treats that as "no relationship yet", not an error.
    pub fn upsert_edge(&self, from_id: &str, to_id: &str, edge: GraphEdge) -> bool {
        let mut graph = self.write_graph();
        let index = self.read_index();

        let (Some(&from), Some(&to)) = (index.get(from_id), index.get(to_id)) else {
            return false;
        };
        drop(index);

        let existing: Option<EdgeIndex> = graph
            .edges_connecting(from, to)
            .find(|e| e.weight().kind == edge.kind)
            .map(|e| e.id());

        match existing {
            Some(eidx) => {
                if let Some(weight) = graph.edge_weight_mut(eidx) {
                    *weight = edge;
                }
                false
            }
            None => {
                graph.add_edge(from, to, edge);
                true
            }
        }
    }

    /// Whether an edge of the given kind exists from `from_id` to `to_id`.
    pub fn has_edge(&self, from_id: &str, to_id: &str, kind: EdgeKind) -> bool {
        self.edge_between(from_id, to_id, kind).is_some()
    }

    /// The edge of the given kind between an ordered pair, if any.
    pub fn edge_between(&self, from_id: &str, to_id: &str, kind: EdgeKind) -> Option<GraphEdge> {
        let graph = self.read_graph();
        let index = self.read_index();

        let (&from, &to) = (index.get(from_id)?, index.get(to_id)?);
        graph
            .edges_connecting(from, to)
            .find(|e| e.weight().kind == kind)
            .map(|e| e.weight().clone())
    }

    /// Outgoing edges of a kind from a node, as (target id, edge) pairs.
    pub fn edges_from(&self, id: &str, kind: EdgeKind) -> Vec<(String, GraphEdge)> {
        let graph = self.read_graph();
        let index = self.read_index();

        if let Some(&idx) = index.get(id) {
            graph
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| e.weight().kind == kind)
                .filter_map(|e| {
                    let target = graph.node_weight(e.target())?;
                    Some((target.id.clone(), e.weight().clone()))
                })
                .collect()
        } else {
            vec![]
        }
    }

    /// All edges of a kind as (source id, target id, edge) triples.
    pub fn get_edges_by_kind(&self, kind: EdgeKind) -> Vec<(String, String, GraphEdge)> {
        let graph = self.read_graph();

        graph
            .edge_references()
            .filter(|e| e.weight().kind == kind)
            .filter_map(|e| {
                let src = graph.node_weight(e.source())?;
                let dst = graph.node_weight(e.target())?;
                Some((src.id.clone(), dst.id.clone(), e.weight().clone()))
            })
            .collect()
    }

    /// Delete edges of the given kinds incident to a node, in either
    /// direction. Returns how many were removed.
    pub fn delete_edges(&self, id: &str, kinds: &[EdgeKind]) -> usize {
        let mut graph = self.write_graph();
        let index = self.read_index();

        let Some(&idx) = index.get(id) else {
            return 0;
        };
        drop(index);

        Self::remove_incident(&mut graph, idx, kinds)
    }

    /// Atomically replace the edges of the given kinds incident to a
    /// node: deletion and recreation happen under one write lock, so no
    /// reader can observe the entity temporarily edge-less.
    ///
    /// Returns the number of edges created.
    pub fn replace_edges(
        &self,
        id: &str,
        kinds: &[EdgeKind],
        edges: Vec<(String, String, GraphEdge)>,
    ) -> usize {
        let mut graph = self.write_graph();
        let index = self.read_index();

        let Some(&idx) = index.get(id) else {
            return 0;
        };

        Self::remove_incident(&mut graph, idx, kinds);

        let mut created = 0;
        for (from_id, to_id, edge) in edges {
            let (Some(&from), Some(&to)) = (index.get(&from_id), index.get(&to_id)) else {
                continue;
            };
            let duplicate = graph
                .edges_connecting(from, to)
                .any(|e| e.weight().kind == edge.kind);
            if !duplicate {
                graph.add_edge(from, to, edge);
                created += 1;
            }
        }
        created
    }

    fn remove_incident(
        graph: &mut StableDiGraph<GraphNode, GraphEdge>,
        idx: NodeIndex,
        kinds: &[EdgeKind],
    ) -> usize {
        let doomed: Vec<EdgeIndex> = graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(graph.edges_directed(idx, Direction::Incoming))
            .filter(|e| kinds.contains(&e.weight().kind))
            .map(|e| e.id())
            .collect();

        let mut removed = 0;
        for eidx in doomed {
            if graph.remove_edge(eidx).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Delete every edge of every kind. Administrative escape hatch.
    pub fn delete_all_edges(&self) -> usize {
        let mut graph = self.write_graph();
        let removed = graph.edge_count();
        graph.clear_edges();
        removed
    }

    // ==================== Counts & Stats ====================

    pub fn node_count(&self) -> usize {
        self.read_graph().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read_graph().edge_count()
    }

    pub fn count_nodes(&self, kind: NodeKind) -> usize {
        self.read_graph()
            .node_weights()
            .filter(|n| n.kind == kind)
            .count()
    }

    pub fn count_edges(&self, kind: EdgeKind) -> usize {
        self.read_graph()
            .edge_references()
            .filter(|e| e.weight().kind == kind)
            .count()
    }

    /// Get statistics
    pub fn stats(&self) -> HashMap<String, i64> {
        let graph = self.read_graph();
        let mut stats = HashMap::new();

        let mut tickets = 0i64;
        let mut categories = 0i64;
        let mut users = 0i64;
        let mut articles = 0i64;

        for node in graph.node_weights() {
            match node.kind {
                NodeKind::Ticket => tickets += 1,
                NodeKind::Category => categories += 1,
                NodeKind::User => users += 1,
                NodeKind::KnowledgeArticle => articles += 1,
                _ => {}
            }
        }

        stats.insert("total_tickets".to_string(), tickets);
        stats.insert("total_categories".to_string(), categories);
        stats.insert("total_users".to_string(), users);
        stats.insert("total_articles".to_string(), articles);
        stats.insert("total_nodes".to_string(), graph.node_count() as i64);
        stats.insert("total_edges".to_string(), graph.edge_count() as i64);

        stats
    }

    // ==================== Persistence ====================

    /// Persist graph to redb
    pub fn save(&self) -> Result<()> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };

        let graph = self.read_graph();

        let write_txn = db.begin_write()?;
        {
            // Rebuild the nodes table from scratch so deleted nodes
            // don't linger on disk.
            let _ = write_txn.delete_table(NODES_TABLE);
            let mut table = write_txn.open_table(NODES_TABLE)?;

            for node in graph.node_weights() {
                let key = format!("node:{}", node.id);
                let value = serde_json::to_vec(node)?;
                table.insert(key.as_str(), value.as_slice())?;
            }

            // Save edges as a single entry
            let edges: Vec<_> = graph
                .edge_references()
                .filter_map(|e| {
                    let src = graph.node_weight(e.source())?;
                    let dst = graph.node_weight(e.target())?;
                    Some((src.id.clone(), dst.id.clone(), e.weight().clone()))
                })
                .collect();

            let edges_data = serde_json::to_vec(&edges)?;

            let _ = write_txn.delete_table(EDGES_TABLE);
            let mut edges_table = write_txn.open_table(EDGES_TABLE)?;
            edges_table.insert("__edges__", edges_data.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Load graph from redb
    fn load(&self) -> Result<()> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };

        let read_txn = db.begin_read()?;

        // Missing tables mean a fresh database
        let nodes_table = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut graph = self.write_graph();
        let mut index = self.write_index();

        for item in nodes_table.range::<&str>(..)? {
            let (key, value) = item?;
            if key.value().starts_with("node:") {
                let node: GraphNode = serde_json::from_slice(value.value())?;
                let id = node.id.clone();
                let idx = graph.add_node(node);
                index.insert(id, idx);
            }
        }

        let edges_table = match read_txn.open_table(EDGES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if let Some(entry) = edges_table.get("__edges__")? {
            let edges: Vec<(String, String, GraphEdge)> =
                serde_json::from_slice(entry.value())?;
            for (from_id, to_id, edge) in edges {
                if let (Some(&from), Some(&to)) = (index.get(&from_id), index.get(&to_id)) {
                    graph.add_edge(from, to, edge);
                }
            }
        }

        Ok(())
    }
}
