//! Engine configuration
//!
//! Loads `deskgraph.toml` from the working directory. Every field has a
//! default, so a missing or partial file is fine; a malformed file falls
//! back to defaults with a warning.
//!
//! ```toml
//! # deskgraph.toml
//!
//! [scorer]
//! base_url = "http://127.0.0.1:8750"
//! timeout_secs = 10
//!
//! [classification]
//! confidence_threshold = 0.75
//! workers = 3
//!
//! [search]
//! accept_threshold = 0.3
//! similarity_threshold = 0.4
//!
//! [sync]
//! similar_fanout = 5
//! bulk_similar_fanout = 20
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "deskgraph.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scorer: ScorerConfig,
    pub classification: ClassificationConfig,
    pub search: SearchConfig,
    pub sync: SyncConfig,
}

/// External classification scorer endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub base_url: String,
    /// Connect/read/write timeout for scorer calls.
    pub timeout_secs: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8750".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ScorerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Confidence gating and worker pool sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Results at or above this confidence are applied automatically;
    /// below it the ticket is routed to manual review.
    pub confidence_threshold: f64,
    /// Bounded classification worker pool size.
    pub workers: usize,
    /// How long the retry worker blocks waiting for queued work.
    pub retry_poll_ms: u64,
    /// Pause before re-attempting a queued ticket.
    pub retry_backoff_ms: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.75,
            workers: 3,
            retry_poll_ms: 10_000,
            retry_backoff_ms: 5_000,
        }
    }
}

impl ClassificationConfig {
    pub fn retry_poll(&self) -> Duration {
        Duration::from_millis(self.retry_poll_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Search and similarity thresholds and result caps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Minimum normalized keyword score for a search hit.
    pub accept_threshold: f32,
    /// Minimum Jaccard similarity for a "related ticket" hit.
    pub similarity_threshold: f32,
    pub ticket_limit: usize,
    pub article_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.3,
            similarity_threshold: 0.4,
            ticket_limit: 20,
            article_limit: 10,
        }
    }
}

/// Similarity edge fan-out bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// SIMILAR_TO edges created per ticket on the online path.
    pub similar_fanout: usize,
    /// SIMILAR_TO edges per ticket during bulk relinking. Bounds edge
    /// growth on large categories, where uncapped linking is quadratic.
    pub bulk_similar_fanout: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            similar_fanout: 5,
            bulk_similar_fanout: 20,
        }
    }
}

/// Load configuration from `<dir>/deskgraph.toml`, falling back to
/// defaults when the file is absent or malformed.
pub fn load_config(dir: &Path) -> EngineConfig {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        return EngineConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                EngineConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            EngineConfig::default()
        }
    }
}
