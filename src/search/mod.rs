//! Search and ranking facade
//!
//! Three distinct query shapes over the graph's candidate sets:
//! keyword-ranked `search`, Jaccard-ranked `find_similar`, and
//! `advanced_search`, which is pure conjunctive filtering with a caller
//! sort — exact matching, never relevance.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::config::SearchConfig;
use crate::graph::{GraphNode, GraphStore, NodeKind};
use crate::models::{priority_rank, SearchCriteria, SortDir, SortKey};
use crate::relevance::{
    extract_keywords, jaccard_similarity, keyword_score, MIN_KEYWORD_LENGTH, TOP_KEYWORDS,
};

pub struct SearchFacade {
    store: Arc<GraphStore>,
    config: SearchConfig,
}

impl SearchFacade {
    pub fn new(store: Arc<GraphStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    fn result_cap(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::KnowledgeArticle => self.config.article_limit,
            _ => self.config.ticket_limit,
        }
    }

    /// Keyword search over all entities of a kind. Candidates scoring
    /// above the acceptance threshold come back ranked, best first.
    pub fn search(&self, query: &str, kind: NodeKind) -> Vec<(GraphNode, f32)> {
        let keywords = extract_keywords(query, MIN_KEYWORD_LENGTH, TOP_KEYWORDS);
        if keywords.is_empty() {
            debug!(query, "no usable keywords in query");
            return vec![];
        }

        let candidates = self.store.get_nodes_by_kind(kind);
        let threshold = self.config.accept_threshold;

        let mut scored: Vec<(GraphNode, f32)> = candidates
            .into_par_iter()
            .filter_map(|node| {
                let score = keyword_score(node.body_text(), node.title(), &keywords);
                (score > threshold).then_some((node, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(self.result_cap(kind));
        scored
    }

    /// Rank other entities of the same kind by word-set similarity to
    /// the given one. Uses its own threshold, stricter than search.
    pub fn find_similar(&self, entity_id: &str, limit: usize) -> Vec<(GraphNode, f32)> {
        let Some(node) = self.store.get_node(entity_id) else {
            return vec![];
        };
        let reference = node.combined_text();
        let threshold = self.config.similarity_threshold;

        let mut scored: Vec<(GraphNode, f32)> = self
            .store
            .get_nodes_by_kind(node.kind)
            .into_par_iter()
            .filter(|candidate| candidate.id != node.id)
            .filter_map(|candidate| {
                let similarity = jaccard_similarity(&reference, &candidate.combined_text());
                (similarity >= threshold).then_some((candidate, similarity))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    /// Conjunctive filter over tickets plus a caller-specified sort.
    /// Every populated criterion must match.
    pub fn advanced_search(&self, criteria: &SearchCriteria) -> Vec<GraphNode> {
        // Category and assignee criteria accept either the canonical id
        // or the display name; translate to ids once up front.
        let category_id = criteria
            .category
            .as_deref()
            .map(|key| self.resolve_id(NodeKind::Category, "name", key));
        let assignee_id = criteria
            .assignee
            .as_deref()
            .map(|key| self.resolve_id(NodeKind::User, "username", key));

        let text_lc = criteria.text.as_deref().map(str::to_lowercase);
        let from = criteria.created_from.as_deref().and_then(parse_timestamp);
        let to = criteria.created_to.as_deref().and_then(parse_timestamp);

        let mut matches: Vec<GraphNode> = self
            .store
            .get_nodes_by_kind(NodeKind::Ticket)
            .into_iter()
            .filter(|ticket| {
                if let Some(status) = criteria.status.as_deref() {
                    if !field_eq(ticket.get_str("status"), status) {
                        return false;
                    }
                }
                if let Some(priority) = criteria.priority.as_deref() {
                    if !field_eq(ticket.get_str("priority"), priority) {
                        return false;
                    }
                }
                if let Some(category_id) = category_id.as_deref() {
                    if ticket.get_str("category") != Some(category_id) {
                        return false;
                    }
                }
                if let Some(assignee_id) = assignee_id.as_deref() {
                    if ticket.get_str("assignedTo") != Some(assignee_id) {
                        return false;
                    }
                }
                if let Some(needle) = text_lc.as_deref() {
                    let haystack = ticket.combined_text().to_lowercase();
                    if !haystack.contains(needle) {
                        return false;
                    }
                }
                if from.is_some() || to.is_some() {
                    let Some(created) =
                        ticket.get_str("createdAt").and_then(parse_timestamp)
                    else {
                        return false;
                    };
                    if let Some(from) = from {
                        if created < from {
                            return false;
                        }
                    }
                    if let Some(to) = to {
                        if created > to {
                            return false;
                        }
                    }
                }
                true
            })
            .collect();

        matches.sort_by(|a, b| {
            let ordering = match criteria.sort_by {
                SortKey::CreatedAt => {
                    let ta = a.get_str("createdAt").and_then(parse_timestamp);
                    let tb = b.get_str("createdAt").and_then(parse_timestamp);
                    ta.cmp(&tb)
                }
                SortKey::Priority => {
                    let ra = priority_rank(a.get_str("priority").unwrap_or(""));
                    let rb = priority_rank(b.get_str("priority").unwrap_or(""));
                    ra.cmp(&rb)
                }
                SortKey::Title => a.title().cmp(b.title()),
                SortKey::Status => a
                    .get_str("status")
                    .unwrap_or("")
                    .cmp(b.get_str("status").unwrap_or("")),
            };
            match criteria.direction {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        matches
    }

    /// Map a name-or-id key to the canonical node id. An unmatched key
    /// is kept verbatim so the filter simply matches nothing.
    fn resolve_id(&self, kind: NodeKind, name_field: &str, key: &str) -> String {
        if let Some(node) = self.store.get_node(key) {
            if node.kind == kind {
                return node.id;
            }
        }
        self.store
            .get_nodes_by_kind(kind)
            .into_iter()
            .find(|n| n.get_str(name_field) == Some(key))
            .map(|n| n.id)
            .unwrap_or_else(|| key.to_string())
    }
}

fn field_eq(field: Option<&str>, expected: &str) -> bool {
    field.is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
