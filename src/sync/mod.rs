//! Relationship synchronization
//!
//! Derives typed edges from the scalar reference fields on entities and
//! keeps the graph consistent as entities change. Scalar fields are
//! authoritative; every edge this module owns can be rebuilt from them,
//! so all writes are idempotent upserts and the whole graph can be
//! repaired with `reinitialize_all`.
//!
//! Writes for a given entity are serialized through a per-entity lock,
//! and resynchronization swaps an entity's edges atomically under the
//! store's write lock, so readers never observe a half-synchronized
//! entity.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::graph::{EdgeKind, GraphEdge, GraphNode, GraphStore, NodeKind};
use crate::models::now_rfc3339;

/// (from id, to id, edge) triple ready to upsert.
type PlannedEdge = (String, String, GraphEdge);

/// Per-kind edge counts from a bulk reinitialization pass.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub categories: usize,
    pub creators: usize,
    pub assignees: usize,
    pub memberships: usize,
    pub slas: usize,
    pub comments: usize,
    pub articles: usize,
    pub similarities: usize,
    pub leaderships: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.categories
            + self.creators
            + self.assignees
            + self.memberships
            + self.slas
            + self.comments
            + self.articles
            + self.similarities
            + self.leaderships
    }

    pub fn summary(&self) -> String {
        format!(
            "{} edges ({} category, {} creator, {} assignee, {} membership, {} sla, \
             {} comment, {} article, {} similarity, {} leadership)",
            self.total(),
            self.categories,
            self.creators,
            self.assignees,
            self.memberships,
            self.slas,
            self.comments,
            self.articles,
            self.similarities,
            self.leaderships,
        )
    }
}

/// Materializes scalar reference fields as typed edges.
pub struct RelationshipSynchronizer {
    store: Arc<GraphStore>,
    config: SyncConfig,
    /// Serializes writes per entity. Concurrent resynchronization of the
    /// same entity is not safe without this.
    entity_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Edge kinds derived from an entity's own scalar fields. These are the
/// kinds `resynchronize` deletes and recreates; edges derived from
/// *other* entities' scalars (e.g. BELONGS_TO incident to a category)
/// are left for their owners.
fn owned_kinds(kind: NodeKind) -> &'static [EdgeKind] {
    match kind {
        NodeKind::Ticket => &[
            EdgeKind::BelongsTo,
            EdgeKind::Created,
            EdgeKind::AssignedTo,
            EdgeKind::HasSla,
            EdgeKind::SimilarTo,
        ],
        NodeKind::KnowledgeArticle => &[EdgeKind::RelatedTo],
        NodeKind::User => &[EdgeKind::MemberOf],
        NodeKind::Team => &[EdgeKind::Leads],
        NodeKind::Comment => &[EdgeKind::CommentOn, EdgeKind::Authored],
        NodeKind::Category | NodeKind::Sla => &[],
    }
}

impl RelationshipSynchronizer {
    pub fn new(store: Arc<GraphStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            entity_locks: DashMap::new(),
        }
    }

    fn entity_lock(&self, entity_id: &str) -> Arc<Mutex<()>> {
        self.entity_locks
            .entry(entity_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ==================== Reference Resolution ====================

    /// Resolve a scalar reference: by id first, then by the kind's name
    /// field.
    pub fn resolve(&self, kind: NodeKind, key: &str) -> Option<GraphNode> {
        if let Some(node) = self.store.get_node(key) {
            if node.kind == kind {
                return Some(node);
            }
        }

        let name_field = match kind {
            NodeKind::Category | NodeKind::Team => "name",
            NodeKind::User => "username",
            _ => return None,
        };

        self.store
            .get_nodes_by_kind(kind)
            .into_iter()
            .find(|n| n.get_str(name_field) == Some(key))
    }

    pub fn resolve_category(&self, key: &str) -> Option<GraphNode> {
        self.resolve(NodeKind::Category, key)
    }

    /// Resolve `entity.<field>` to a target node, canonicalizing the
    /// scalar to the target's id when it was matched by name. After the
    /// first synchronization every reference field holds one canonical
    /// key.
    fn resolve_reference(
        &self,
        entity: &GraphNode,
        field: &str,
        kind: NodeKind,
    ) -> Option<GraphNode> {
        let raw = entity.get_str(field)?.trim();
        if raw.is_empty() {
            return None;
        }

        let Some(target) = self.resolve(kind, raw) else {
            debug!(entity = %entity.id, field, value = raw, "no matching target, skipping");
            return None;
        };

        if target.id != raw {
            self.store
                .update_node_property(&entity.id, field, target.id.clone());
        }

        Some(target)
    }

    // ==================== Edge Planning ====================

    fn plan_category(&self, ticket: &GraphNode) -> Option<PlannedEdge> {
        let category = self.resolve_reference(ticket, "category", NodeKind::Category)?;

        // Edge attributes mirror the ticket's own classification
        // metadata so a rebuilt edge is indistinguishable from the one
        // the classifier created.
        let auto = ticket.get_bool("autoClassified").unwrap_or(false);
        let mut edge = GraphEdge::belongs_to()
            .with_property("linkedAt", now_rfc3339())
            .with_property("autoClassified", auto);
        if auto {
            if let Some(confidence) = ticket.get_f64("confidence") {
                edge = edge.with_property("confidence", confidence);
            }
        }

        Some((ticket.id.clone(), category.id, edge))
    }

    fn plan_creator(&self, ticket: &GraphNode) -> Option<PlannedEdge> {
        let creator = self.resolve_reference(ticket, "createdBy", NodeKind::User)?;
        let created_at = ticket
            .get_str("createdAt")
            .map(str::to_string)
            .unwrap_or_else(now_rfc3339);
        let edge = GraphEdge::created().with_property("createdAt", created_at);
        Some((creator.id, ticket.id.clone(), edge))
    }

    fn plan_assignee(&self, ticket: &GraphNode) -> Option<PlannedEdge> {
        let assignee = self.resolve_reference(ticket, "assignedTo", NodeKind::User)?;
        let edge = GraphEdge::assigned_to().with_property("assignedAt", now_rfc3339());
        Some((ticket.id.clone(), assignee.id, edge))
    }

    fn plan_sla(&self, ticket: &GraphNode) -> Option<PlannedEdge> {
        let priority = ticket.get_str("priority")?.trim();
        if priority.is_empty() {
            return None;
        }

        let sla = self
            .store
            .get_nodes_by_kind(NodeKind::Sla)
            .into_iter()
            .filter(|s| s.get_bool("active").unwrap_or(true))
            .find(|s| s.get_str("priority") == Some(priority))?;

        let edge = GraphEdge::has_sla().with_property("appliedAt", now_rfc3339());
        Some((ticket.id.clone(), sla.id, edge))
    }

    fn plan_article_link(&self, article: &GraphNode) -> Option<PlannedEdge> {
        let category = self.resolve_reference(article, "category", NodeKind::Category)?;
        let edge = GraphEdge::related_to().with_property("linkedAt", now_rfc3339());
        Some((article.id.clone(), category.id, edge))
    }

    fn plan_membership(&self, user: &GraphNode) -> Option<PlannedEdge> {
        let team = self.resolve_reference(user, "team", NodeKind::Team)?;
        let edge = GraphEdge::member_of().with_property("joinedAt", now_rfc3339());
        Some((user.id.clone(), team.id, edge))
    }

    fn plan_leadership(&self, team: &GraphNode) -> Option<PlannedEdge> {
        let leader = self.resolve_reference(team, "leader", NodeKind::User)?;
        let edge = GraphEdge::leads().with_property("since", now_rfc3339());
        Some((leader.id, team.id.clone(), edge))
    }

    fn plan_comment_link(&self, comment: &GraphNode) -> Option<PlannedEdge> {
        let ticket = self.resolve_reference(comment, "ticketId", NodeKind::Ticket)?;
        let posted_at = comment
            .get_str("postedAt")
            .map(str::to_string)
            .unwrap_or_else(now_rfc3339);
        let edge = GraphEdge::comment_on().with_property("postedAt", posted_at);
        Some((comment.id.clone(), ticket.id, edge))
    }

    fn plan_comment_author(&self, comment: &GraphNode) -> Option<PlannedEdge> {
        let author = self.resolve_reference(comment, "author", NodeKind::User)?;
        let posted_at = comment
            .get_str("postedAt")
            .map(str::to_string)
            .unwrap_or_else(now_rfc3339);
        let edge = GraphEdge::authored().with_property("postedAt", posted_at);
        Some((author.id, comment.id.clone(), edge))
    }

    /// All scalar-derived edges for one entity.
    fn plan_for(&self, node: &GraphNode) -> Vec<PlannedEdge> {
        match node.kind {
            NodeKind::Ticket => [
                self.plan_category(node),
                self.plan_creator(node),
                self.plan_assignee(node),
                self.plan_sla(node),
            ]
            .into_iter()
            .flatten()
            .collect(),
            NodeKind::KnowledgeArticle => self.plan_article_link(node).into_iter().collect(),
            NodeKind::User => self.plan_membership(node).into_iter().collect(),
            NodeKind::Team => self.plan_leadership(node).into_iter().collect(),
            NodeKind::Comment => [
                self.plan_comment_link(node),
                self.plan_comment_author(node),
            ]
            .into_iter()
            .flatten()
            .collect(),
            NodeKind::Category | NodeKind::Sla => vec![],
        }
    }

    /// Candidate SIMILAR_TO edges for a ticket: peers sharing its
    /// category, lower id as source so an unordered pair maps to exactly
    /// one directed edge. `skip_linked` excludes pairs that already have
    /// an edge (the online path); the resynchronization path rebuilds
    /// from scratch and skips the lookups.
    fn plan_similar(&self, ticket: &GraphNode, fanout: usize, skip_linked: bool) -> Vec<PlannedEdge> {
        let Some(category) = ticket
            .get_str("category")
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            return vec![];
        };

        let reason = match self.resolve_category(category) {
            Some(cat) => format!("shared category: {}", cat.display_name()),
            None => format!("shared category: {}", category),
        };

        let mut peers: Vec<GraphNode> = self
            .store
            .get_nodes_by_kind(NodeKind::Ticket)
            .into_iter()
            .filter(|t| t.id != ticket.id)
            .filter(|t| t.get_str("category").map(str::trim) == Some(category))
            .collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges = Vec::new();
        for peer in peers {
            if edges.len() >= fanout {
                break;
            }
            let (from, to) = if ticket.id < peer.id {
                (&ticket.id, &peer.id)
            } else {
                (&peer.id, &ticket.id)
            };
            if skip_linked && self.store.has_edge(from, to, EdgeKind::SimilarTo) {
                continue;
            }
            let edge = GraphEdge::similar_to()
                .with_property("reason", reason.clone())
                .with_property("linkedAt", now_rfc3339());
            edges.push((from.clone(), to.clone(), edge));
        }
        edges
    }

    fn apply(&self, planned: impl IntoIterator<Item = PlannedEdge>) -> usize {
        planned
            .into_iter()
            .filter(|(from, to, edge)| self.store.upsert_edge(from, to, edge.clone()))
            .count()
    }

    // ==================== Public Operations ====================

    /// Materialize edges for a freshly created or updated entity. One
    /// idempotent upsert per relevant edge kind; empty reference fields
    /// and unmatched targets are silently skipped.
    ///
    /// Returns the number of edges created.
    pub fn synchronize(&self, entity_id: &str) -> usize {
        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().expect("entity lock poisoned");

        let Some(node) = self.store.get_node(entity_id) else {
            debug!(entity = %entity_id, "synchronize skipped, unknown entity");
            return 0;
        };

        let created = self.apply(self.plan_for(&node));
        debug!(entity = %entity_id, created, "synchronized");
        created
    }

    /// Rebuild an entity's edges after an update: every edge kind this
    /// entity owns is deleted and recreated from its current scalar
    /// fields, in one atomic store operation. Tickets also get their
    /// similarity links recomputed with the online fan-out.
    pub fn resynchronize(&self, entity_id: &str) -> usize {
        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().expect("entity lock poisoned");

        let Some(node) = self.store.get_node(entity_id) else {
            debug!(entity = %entity_id, "resynchronize skipped, unknown entity");
            return 0;
        };

        let kinds = owned_kinds(node.kind);
        if kinds.is_empty() {
            return 0;
        }

        let mut plan = self.plan_for(&node);
        if node.kind == NodeKind::Ticket {
            // Re-read: plan_for may have canonicalized the category field.
            if let Some(fresh) = self.store.get_node(entity_id) {
                plan.extend(self.plan_similar(&fresh, self.config.similar_fanout, false));
            }
        }

        let created = self.store.replace_edges(entity_id, kinds, plan);
        debug!(entity = %entity_id, created, "resynchronized");
        created
    }

    /// Link a ticket to peers sharing its category, up to `fanout` new
    /// edges. Pairs that are already linked don't count against the
    /// budget.
    pub fn link_similar(&self, entity_id: &str, fanout: usize) -> usize {
        let lock = self.entity_lock(entity_id);
        let _guard = lock.lock().expect("entity lock poisoned");

        let Some(node) = self.store.get_node(entity_id) else {
            return 0;
        };
        if node.kind != NodeKind::Ticket {
            return 0;
        }

        self.apply(self.plan_similar(&node, fanout, true))
    }

    /// Recompute SIMILAR_TO for the whole population. One edge per
    /// unordered pair (lower id as source), at most `bulk_similar_fanout`
    /// links per ticket. Deterministic traversal order makes repeat runs
    /// no-ops.
    pub fn link_all_similar(&self) -> usize {
        let tickets = self.store.get_nodes_by_kind(NodeKind::Ticket);

        let mut groups: HashMap<&str, Vec<&GraphNode>> = HashMap::new();
        for ticket in &tickets {
            if let Some(category) = ticket
                .get_str("category")
                .map(str::trim)
                .filter(|c| !c.is_empty())
            {
                groups.entry(category).or_default().push(ticket);
            }
        }

        let cap = self.config.bulk_similar_fanout;
        let mut degree: HashMap<&str, usize> = HashMap::new();
        let mut created = 0;

        let mut categories: Vec<&str> = groups.keys().copied().collect();
        categories.sort_unstable();

        for category in categories {
            let mut group = groups.remove(category).unwrap_or_default();
            group.sort_by(|a, b| a.id.cmp(&b.id));

            let reason = match self.resolve_category(category) {
                Some(cat) => format!("shared category: {}", cat.display_name()),
                None => format!("shared category: {}", category),
            };

            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    let (a, b) = (group[i].id.as_str(), group[j].id.as_str());
                    if degree.get(a).copied().unwrap_or(0) >= cap {
                        break;
                    }
                    if degree.get(b).copied().unwrap_or(0) >= cap {
                        continue;
                    }

                    let edge = GraphEdge::similar_to()
                        .with_property("reason", reason.clone())
                        .with_property("linkedAt", now_rfc3339());
                    if self.store.upsert_edge(a, b, edge) {
                        created += 1;
                    }
                    // Pre-existing links count against the cap too, so a
                    // repeat run replays the same decisions.
                    *degree.entry(a).or_insert(0) += 1;
                    *degree.entry(b).or_insert(0) += 1;
                }
            }
        }

        created
    }

    /// Replace a ticket's current classification edge. Any stale
    /// BELONGS_TO edge is removed in the same store operation.
    pub fn relink_category(
        &self,
        ticket_id: &str,
        category_id: &str,
        confidence: f64,
        auto_classified: bool,
    ) -> bool {
        let lock = self.entity_lock(ticket_id);
        let _guard = lock.lock().expect("entity lock poisoned");

        let edge = GraphEdge::belongs_to()
            .with_property("linkedAt", now_rfc3339())
            .with_property("confidence", confidence)
            .with_property("autoClassified", auto_classified);

        self.store.replace_edges(
            ticket_id,
            &[EdgeKind::BelongsTo],
            vec![(ticket_id.to_string(), category_id.to_string(), edge)],
        ) > 0
    }

    /// Rederive every edge kind across the whole population, in a fixed
    /// order, logging a count per kind. Pure upserts — safe to run
    /// repeatedly, including on a store that was populated without any
    /// application-level change events.
    pub fn reinitialize_all(&self) -> SyncReport {
        let tickets = self.store.get_nodes_by_kind(NodeKind::Ticket);
        let users = self.store.get_nodes_by_kind(NodeKind::User);
        let teams = self.store.get_nodes_by_kind(NodeKind::Team);
        let comments = self.store.get_nodes_by_kind(NodeKind::Comment);
        let articles = self.store.get_nodes_by_kind(NodeKind::KnowledgeArticle);

        let mut report = SyncReport::default();

        report.categories = self.apply(tickets.iter().filter_map(|t| self.plan_category(t)));
        info!(count = report.categories, "linked ticket categories");

        report.creators = self.apply(tickets.iter().filter_map(|t| self.plan_creator(t)));
        info!(count = report.creators, "linked ticket creators");

        report.assignees = self.apply(tickets.iter().filter_map(|t| self.plan_assignee(t)));
        info!(count = report.assignees, "linked ticket assignees");

        report.memberships = self.apply(users.iter().filter_map(|u| self.plan_membership(u)));
        info!(count = report.memberships, "linked team memberships");

        report.slas = self.apply(tickets.iter().filter_map(|t| self.plan_sla(t)));
        info!(count = report.slas, "linked SLAs");

        report.comments = self.apply(
            comments
                .iter()
                .filter_map(|c| self.plan_comment_link(c))
                .chain(comments.iter().filter_map(|c| self.plan_comment_author(c))),
        );
        info!(count = report.comments, "linked comments");

        report.articles = self.apply(articles.iter().filter_map(|a| self.plan_article_link(a)));
        info!(count = report.articles, "linked knowledge articles");

        report.similarities = self.link_all_similar();
        info!(count = report.similarities, "linked similar tickets");

        report.leaderships = self.apply(teams.iter().filter_map(|t| self.plan_leadership(t)));
        info!(count = report.leaderships, "linked team leaderships");

        info!("reinitialized: {}", report.summary());
        report
    }

    /// Fast repair: only the ticket's category, creator and assignee
    /// links.
    pub fn quick_reinitialize(&self) -> SyncReport {
        let tickets = self.store.get_nodes_by_kind(NodeKind::Ticket);

        let mut report = SyncReport::default();

        report.categories = self.apply(tickets.iter().filter_map(|t| self.plan_category(t)));
        info!(count = report.categories, "linked ticket categories");

        report.creators = self.apply(tickets.iter().filter_map(|t| self.plan_creator(t)));
        info!(count = report.creators, "linked ticket creators");

        report.assignees = self.apply(tickets.iter().filter_map(|t| self.plan_assignee(t)));
        info!(count = report.assignees, "linked ticket assignees");

        report
    }

    /// Remove every edge of every kind. Administrative escape hatch, not
    /// part of normal operation.
    pub fn delete_all_edges(&self) -> usize {
        let removed = self.store.delete_all_edges();
        warn!(removed, "deleted every edge in the store");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;

    fn synchronizer(store: &Arc<GraphStore>) -> RelationshipSynchronizer {
        RelationshipSynchronizer::new(Arc::clone(store), SyncConfig::default())
    }

    fn seeded_store() -> Arc<GraphStore> {
        let store = Arc::new(GraphStore::in_memory());
        store.upsert_node(GraphNode::category("C1", "Billing"));
        store.upsert_node(GraphNode::category("C2", "Hardware"));
        store.upsert_node(GraphNode::user("U1", "ada"));
        store.upsert_node(GraphNode::user("U2", "brian"));
        store.upsert_node(GraphNode::sla("S1", "high"));
        store
    }

    #[test]
    fn test_synchronize_creates_belongs_to() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "Invoice is wrong").with_property("category", "Billing"),
        );

        let created = sync.synchronize("T1");
        assert_eq!(created, 1);
        assert!(store.has_edge("T1", "C1", EdgeKind::BelongsTo));
        assert_eq!(store.count_edges(EdgeKind::BelongsTo), 1);

        // Matched by name: the scalar is canonicalized to the id.
        assert_eq!(store.get_node("T1").unwrap().get_str("category"), Some("C1"));
    }

    #[test]
    fn test_synchronize_all_ticket_kinds() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "Laptop will not boot")
                .with_property("category", "Hardware")
                .with_property("createdBy", "ada")
                .with_property("assignedTo", "brian")
                .with_property("priority", "high"),
        );

        assert_eq!(sync.synchronize("T1"), 4);
        assert!(store.has_edge("T1", "C2", EdgeKind::BelongsTo));
        assert!(store.has_edge("U1", "T1", EdgeKind::Created));
        assert!(store.has_edge("T1", "U2", EdgeKind::AssignedTo));
        assert!(store.has_edge("T1", "S1", EdgeKind::HasSla));
    }

    #[test]
    fn test_synchronize_skips_empty_and_unmatched() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "orphan")
                .with_property("category", "")
                .with_property("assignedTo", "nobody-here")
                .with_property("priority", "low"), // no low SLA seeded
        );

        // Not an error, just no relationships yet.
        assert_eq!(sync.synchronize("T1"), 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_synchronize_is_idempotent() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "t")
                .with_property("category", "Billing")
                .with_property("createdBy", "ada"),
        );

        sync.synchronize("T1");
        let count = store.edge_count();
        sync.synchronize("T1");
        assert_eq!(store.edge_count(), count);
    }

    #[test]
    fn test_resynchronize_drops_stale_edges() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "t")
                .with_property("category", "Billing")
                .with_property("assignedTo", "ada"),
        );
        sync.synchronize("T1");
        assert!(store.has_edge("T1", "C1", EdgeKind::BelongsTo));

        // Reassign and recategorize, then resynchronize.
        store.update_node_property("T1", "category", "Hardware");
        store.update_node_property("T1", "assignedTo", "brian");
        sync.resynchronize("T1");

        assert!(!store.has_edge("T1", "C1", EdgeKind::BelongsTo));
        assert!(store.has_edge("T1", "C2", EdgeKind::BelongsTo));
        assert!(!store.has_edge("T1", "U1", EdgeKind::AssignedTo));
        assert!(store.has_edge("T1", "U2", EdgeKind::AssignedTo));
        assert_eq!(store.count_edges(EdgeKind::BelongsTo), 1);
        assert_eq!(store.count_edges(EdgeKind::AssignedTo), 1);
    }

    #[test]
    fn test_resynchronize_clears_when_fields_emptied() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(GraphNode::ticket("T1", "t").with_property("category", "Billing"));
        sync.synchronize("T1");

        store.update_node_property("T1", "category", "");
        sync.resynchronize("T1");

        assert_eq!(store.count_edges(EdgeKind::BelongsTo), 0);
    }

    #[test]
    fn test_link_similar_tie_break_and_fanout() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        for id in ["T1", "T2", "T3", "T4"] {
            store.upsert_node(
                GraphNode::ticket(id, "t").with_property("category", "C1"),
            );
        }

        // T3 links toward both lower and higher ids; lower id is always
        // the source.
        let created = sync.link_similar("T3", 2);
        assert_eq!(created, 2);
        assert!(store.has_edge("T1", "T3", EdgeKind::SimilarTo));
        assert!(store.has_edge("T2", "T3", EdgeKind::SimilarTo));
        assert!(!store.has_edge("T3", "T1", EdgeKind::SimilarTo));

        // Already-linked pairs are excluded, so the next call only adds
        // the remaining peer.
        let created = sync.link_similar("T3", 5);
        assert_eq!(created, 1);
        assert!(store.has_edge("T3", "T4", EdgeKind::SimilarTo));
    }

    #[test]
    fn test_link_all_similar_single_edge_per_pair() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        for id in ["T1", "T2", "T3"] {
            store.upsert_node(GraphNode::ticket(id, "t").with_property("category", "C1"));
        }
        store.upsert_node(GraphNode::ticket("T9", "t").with_property("category", "C2"));

        let created = sync.link_all_similar();
        // Three tickets in one category: 3 unordered pairs.
        assert_eq!(created, 3);
        assert_eq!(store.count_edges(EdgeKind::SimilarTo), 3);
        assert!(store.has_edge("T1", "T2", EdgeKind::SimilarTo));
        assert!(store.has_edge("T1", "T3", EdgeKind::SimilarTo));
        assert!(store.has_edge("T2", "T3", EdgeKind::SimilarTo));

        // Repeat run is a no-op.
        assert_eq!(sync.link_all_similar(), 0);
        assert_eq!(store.count_edges(EdgeKind::SimilarTo), 3);
    }

    #[test]
    fn test_link_all_similar_respects_cap() {
        let store = seeded_store();
        let sync = RelationshipSynchronizer::new(
            Arc::clone(&store),
            SyncConfig {
                similar_fanout: 5,
                bulk_similar_fanout: 2,
            },
        );

        for id in ["T1", "T2", "T3", "T4", "T5"] {
            store.upsert_node(GraphNode::ticket(id, "t").with_property("category", "C1"));
        }

        sync.link_all_similar();

        // No ticket exceeds the cap in either direction.
        for id in ["T1", "T2", "T3", "T4", "T5"] {
            let degree = store
                .get_edges_by_kind(EdgeKind::SimilarTo)
                .into_iter()
                .filter(|(from, to, _)| from == id || to == id)
                .count();
            assert!(degree <= 2, "{} has degree {}", id, degree);
        }
    }

    #[test]
    fn test_reinitialize_all_idempotent() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(GraphNode::team("TM1", "Support").with_property("leader", "ada"));
        store.upsert_node(
            GraphNode::ticket("T1", "t")
                .with_property("category", "Billing")
                .with_property("createdBy", "ada")
                .with_property("priority", "high"),
        );
        store.upsert_node(GraphNode::ticket("T2", "t").with_property("category", "Billing"));
        store.upsert_node(GraphNode::article("K1", "Refund policy").with_property("category", "Billing"));
        store.upsert_node(
            GraphNode::comment("CM1", "T1").with_property("author", "brian"),
        );
        store.update_node_property("U1", "team", "Support");

        let first = sync.reinitialize_all();
        assert!(first.total() > 0);
        let edges_after_first = store.edge_count();

        let second = sync.reinitialize_all();
        assert_eq!(second.total(), 0);
        assert_eq!(store.edge_count(), edges_after_first);
    }

    #[test]
    fn test_quick_reinitialize_subset() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(
            GraphNode::ticket("T1", "t")
                .with_property("category", "Billing")
                .with_property("createdBy", "ada")
                .with_property("assignedTo", "brian")
                .with_property("priority", "high"),
        );

        let report = sync.quick_reinitialize();
        assert_eq!(report.categories, 1);
        assert_eq!(report.creators, 1);
        assert_eq!(report.assignees, 1);
        // SLA linking belongs to the full pass only.
        assert_eq!(report.slas, 0);
        assert!(!store.has_edge("T1", "S1", EdgeKind::HasSla));
    }

    #[test]
    fn test_relink_category_replaces_stale_edge() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(GraphNode::ticket("T1", "t").with_property("category", "C1"));
        sync.synchronize("T1");

        assert!(sync.relink_category("T1", "C2", 0.82, true));

        assert!(!store.has_edge("T1", "C1", EdgeKind::BelongsTo));
        let edge = store.edge_between("T1", "C2", EdgeKind::BelongsTo).unwrap();
        assert_eq!(edge.get_f64("confidence"), Some(0.82));
        assert_eq!(edge.get_bool("autoClassified"), Some(true));
    }

    #[test]
    fn test_delete_all_edges() {
        let store = seeded_store();
        let sync = synchronizer(&store);

        store.upsert_node(GraphNode::ticket("T1", "t").with_property("category", "C1"));
        sync.synchronize("T1");
        assert!(store.edge_count() > 0);

        sync.delete_all_edges();
        assert_eq!(store.edge_count(), 0);
    }
}
