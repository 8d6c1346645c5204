use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node types in the ticket graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Ticket,
    Category,
    User,
    Sla,
    KnowledgeArticle,
    Team,
    Comment,
}

/// A node in the ticket graph
///
/// Nodes are opaque records: a stable string id, a kind, and a scalar
/// property map. The property map holds the authoritative fields edges
/// are derived from (`category`, `assignedTo`, `createdBy`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub kind: NodeKind,
    pub id: String,
    pub properties: HashMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(kind: NodeKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
            properties: HashMap::new(),
        }
    }

    pub fn ticket(id: &str, title: &str) -> Self {
        Self::new(NodeKind::Ticket, id).with_property("title", title)
    }

    pub fn category(id: &str, name: &str) -> Self {
        Self::new(NodeKind::Category, id).with_property("name", name)
    }

    pub fn user(id: &str, username: &str) -> Self {
        Self::new(NodeKind::User, id).with_property("username", username)
    }

    pub fn sla(id: &str, priority: &str) -> Self {
        Self::new(NodeKind::Sla, id)
            .with_property("priority", priority)
            .with_property("active", true)
    }

    pub fn article(id: &str, title: &str) -> Self {
        Self::new(NodeKind::KnowledgeArticle, id).with_property("title", title)
    }

    pub fn team(id: &str, name: &str) -> Self {
        Self::new(NodeKind::Team, id).with_property("name", name)
    }

    pub fn comment(id: &str, ticket_id: &str) -> Self {
        Self::new(NodeKind::Comment, id).with_property("ticketId", ticket_id)
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_bool())
    }

    /// Display name: `title` for tickets/articles, `name` or `username`
    /// for the rest, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.get_str("title")
            .or_else(|| self.get_str("name"))
            .or_else(|| self.get_str("username"))
            .unwrap_or(&self.id)
    }

    /// Searchable title for ranking. Empty for kinds without one.
    pub fn title(&self) -> &str {
        self.get_str("title").unwrap_or("")
    }

    /// Searchable body text: `description` for tickets, `content` for
    /// knowledge articles.
    pub fn body_text(&self) -> &str {
        match self.kind {
            NodeKind::Ticket => self.get_str("description").unwrap_or(""),
            NodeKind::KnowledgeArticle => self.get_str("content").unwrap_or(""),
            _ => "",
        }
    }

    /// Combined title + body, the unit of similarity comparison.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title(), self.body_text())
    }
}

/// Edge types in the ticket graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    BelongsTo,
    Created,
    AssignedTo,
    HasSla,
    SimilarTo,
    RelatedTo,
    MemberOf,
    Leads,
    CommentOn,
    Authored,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::BelongsTo => "BELONGS_TO",
            EdgeKind::Created => "CREATED",
            EdgeKind::AssignedTo => "ASSIGNED_TO",
            EdgeKind::HasSla => "HAS_SLA",
            EdgeKind::SimilarTo => "SIMILAR_TO",
            EdgeKind::RelatedTo => "RELATED_TO",
            EdgeKind::MemberOf => "MEMBER_OF",
            EdgeKind::Leads => "LEADS",
            EdgeKind::CommentOn => "COMMENT_ON",
            EdgeKind::Authored => "AUTHORED",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge in the ticket graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub properties: HashMap<String, serde_json::Value>,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            properties: HashMap::new(),
        }
    }

    pub fn belongs_to() -> Self {
        Self::new(EdgeKind::BelongsTo)
    }

    pub fn created() -> Self {
        Self::new(EdgeKind::Created)
    }

    pub fn assigned_to() -> Self {
        Self::new(EdgeKind::AssignedTo)
    }

    pub fn has_sla() -> Self {
        Self::new(EdgeKind::HasSla)
    }

    pub fn similar_to() -> Self {
        Self::new(EdgeKind::SimilarTo)
    }

    pub fn related_to() -> Self {
        Self::new(EdgeKind::RelatedTo)
    }

    pub fn member_of() -> Self {
        Self::new(EdgeKind::MemberOf)
    }

    pub fn leads() -> Self {
        Self::new(EdgeKind::Leads)
    }

    pub fn comment_on() -> Self {
        Self::new(EdgeKind::CommentOn)
    }

    pub fn authored() -> Self {
        Self::new(EdgeKind::Authored)
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}
