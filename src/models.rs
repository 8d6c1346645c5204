use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current UTC time as the RFC 3339 string stored on nodes and edges.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Lifecycle of a ticket inside the classification workflow.
///
/// `UNCLASSIFIED → PENDING → {CLASSIFIED | NEEDS_REVIEW | FAILED_RETRYING}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationStatus {
    #[default]
    Unclassified,
    Pending,
    Classified,
    NeedsReview,
    FailedRetrying,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Unclassified => "UNCLASSIFIED",
            ClassificationStatus::Pending => "PENDING",
            ClassificationStatus::Classified => "CLASSIFIED",
            ClassificationStatus::NeedsReview => "NEEDS_REVIEW",
            ClassificationStatus::FailedRetrying => "FAILED_RETRYING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNCLASSIFIED" => Some(ClassificationStatus::Unclassified),
            "PENDING" => Some(ClassificationStatus::Pending),
            "CLASSIFIED" => Some(ClassificationStatus::Classified),
            "NEEDS_REVIEW" => Some(ClassificationStatus::NeedsReview),
            "FAILED_RETRYING" => Some(ClassificationStatus::FailedRetrying),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank a priority label for ordering. Unknown labels sort last.
pub fn priority_rank(priority: &str) -> u8 {
    match priority.to_ascii_lowercase().as_str() {
        "critical" => 4,
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

/// Sort key for `advanced_search`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Priority,
    Title,
    Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Conjunctive filter criteria for `advanced_search`.
///
/// Every populated field must match; this is exact filtering, not
/// relevance ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Category id or name.
    pub category: Option<String>,
    /// Assignee user id or username.
    pub assignee: Option<String>,
    /// Case-insensitive substring over title and description.
    pub text: Option<String>,
    /// Inclusive lower bound on creation time (RFC 3339).
    pub created_from: Option<String>,
    /// Inclusive upper bound on creation time (RFC 3339).
    pub created_to: Option<String>,
    pub sort_by: SortKey,
    pub direction: SortDir,
}

/// Aggregate view of the classification workflow.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationStats {
    pub total: usize,
    pub unclassified: usize,
    pub pending: usize,
    pub classified: usize,
    pub needs_review: usize,
    pub failed_retrying: usize,
    /// Tickets whose current classification was applied automatically.
    pub auto_classified: usize,
    /// Mean confidence over auto-classified tickets, if any.
    pub mean_confidence: Option<f64>,
}

impl ClassificationStats {
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} tickets", self.total),
            format!("{} classified", self.classified),
            format!("{} needs review", self.needs_review),
            format!("{} pending", self.pending),
            format!("{} retrying", self.failed_retrying),
        ];
        if let Some(mean) = self.mean_confidence {
            parts.push(format!("mean confidence {:.2}", mean));
        }
        parts.join(", ")
    }
}
