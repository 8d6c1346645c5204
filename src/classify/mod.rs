//! Confidence-gated ticket classification
//!
//! Talks to an external scoring service over HTTP and applies its
//! predictions to the graph — but only above a confidence threshold;
//! anything less is routed to manual review. Transient scorer failures
//! land on a retry queue drained by a supervised background worker.
//!
//! The scorer is an opaque collaborator: this module only consumes its
//! `/health` and `/classify` contract.

mod client;
mod gateway;

pub use client::{CategoryScore, ClassificationResult, ClassifyRequest, ScorerClient};
pub use gateway::{ClassificationGateway, ClassifyHandle};

use thiserror::Error;

/// Errors that can occur during classification
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("scorer transport failure: {0}")]
    Transport(String),

    #[error("scorer returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse scorer response: {0}")]
    Parse(String),

    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),
}

impl ClassifyError {
    /// Transport and protocol failures are transient from this side;
    /// everything else needs a human.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ClassifyError::Transport(_) | ClassifyError::Api { .. }
        )
    }
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;
