//! HTTP client for the external classification scorer
//!
//! Sync HTTP via ureq — no async runtime needed. The scorer exposes
//! `GET /health` and `POST /classify`; both are covered here and nothing
//! else is assumed about it.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::classify::{ClassifyError, ClassifyResult};
use crate::config::ScorerConfig;

/// Request body for `POST /classify`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    pub ticket_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
}

/// A scored category candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category_id: String,
    pub category_name: String,
    pub confidence: f64,
}

/// Response body from `POST /classify`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Predicted category id
    pub predicted_category: String,
    pub category_name: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub alternatives: Vec<CategoryScore>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // We handle status codes ourselves
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

/// Sync HTTP client for the scorer endpoint
pub struct ScorerClient {
    base_url: String,
    agent: ureq::Agent,
}

impl ScorerClient {
    pub fn new(config: &ScorerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent: make_agent(config.timeout()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the scorer is ready to accept work.
    pub fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.agent.get(&url).call() {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                debug!("scorer health check failed: {}", e);
                false
            }
        }
    }

    /// Classify one ticket. Transport errors and non-success statuses
    /// surface as retryable failures; a response that doesn't honor the
    /// contract is a parse failure.
    pub fn classify(&self, request: &ClassifyRequest) -> ClassifyResult<ClassificationResult> {
        let url = format!("{}/classify", self.base_url);

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send_json(request)
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.into_body().read_to_string().unwrap_or_default();
            return Err(ClassifyError::Api { status, message });
        }

        let result: ClassificationResult = response
            .into_body()
            .read_json()
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        if !(0.0..=1.0).contains(&result.confidence) {
            return Err(ClassifyError::Parse(format!(
                "confidence {} outside [0, 1]",
                result.confidence
            )));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ScorerClient::new(&ScorerConfig {
            base_url: "http://localhost:9999/".to_string(),
            timeout_secs: 1,
        });
        assert_eq!(client.base_url(), "http://localhost:9999");
    }

    #[test]
    fn test_result_parses_with_missing_optionals() {
        let result: ClassificationResult = serde_json::from_str(
            r#"{"predictedCategory": "C1", "categoryName": "Billing", "confidence": 0.82}"#,
        )
        .expect("parse minimal result");
        assert_eq!(result.predicted_category, "C1");
        assert!(result.alternatives.is_empty());
        assert!(result.timestamp.is_none());
    }

    #[test]
    fn test_health_check_false_when_unreachable() {
        // Nothing listens here; health must degrade to false, not error.
        let client = ScorerClient::new(&ScorerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        });
        assert!(!client.healthy());
    }
}
