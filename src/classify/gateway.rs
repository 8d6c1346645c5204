//! Classification gateway
//!
//! Orchestrates the classification workflow against the external scorer:
//! a bounded worker pool for async requests, a confidence gate deciding
//! whether results are applied or routed to review, and a supervised
//! retry worker draining transient failures.
//!
//! Per-ticket state machine:
//! `UNCLASSIFIED → PENDING → {CLASSIFIED | NEEDS_REVIEW | FAILED_RETRYING}`

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationResult, ClassifyError, ClassifyRequest, ClassifyResult, ScorerClient};
use crate::config::ClassificationConfig;
use crate::graph::{GraphStore, NodeKind};
use crate::models::{now_rfc3339, ClassificationStats, ClassificationStatus};
use crate::sync::RelationshipSynchronizer;

/// Resolves to the classification outcome of one async submission.
///
/// `None` means "not yet classified" — the scorer was unavailable, the
/// call failed (and was queued for retry), or the gateway is shutting
/// down. Never a hard failure.
pub struct ClassifyHandle {
    rx: Receiver<Option<ClassificationResult>>,
}

impl ClassifyHandle {
    /// Block until the submission completes.
    pub fn wait(self) -> Option<ClassificationResult> {
        self.rx.recv().ok().flatten()
    }

    fn resolved(result: Option<ClassificationResult>) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(result);
        Self { rx }
    }
}

struct Job {
    ticket_id: String,
    done: Sender<Option<ClassificationResult>>,
}

struct GatewayInner {
    store: Arc<GraphStore>,
    sync: Arc<RelationshipSynchronizer>,
    client: ScorerClient,
    config: ClassificationConfig,
    retry_tx: Sender<String>,
}

impl GatewayInner {
    fn build_request(&self, ticket_id: &str) -> ClassifyResult<ClassifyRequest> {
        let ticket = self
            .store
            .get_node(ticket_id)
            .filter(|n| n.kind == NodeKind::Ticket)
            .ok_or_else(|| ClassifyError::TicketNotFound(ticket_id.to_string()))?;

        Ok(ClassifyRequest {
            ticket_id: ticket.id.clone(),
            title: ticket.title().to_string(),
            description: ticket.body_text().to_string(),
            priority: ticket.get_str("priority").unwrap_or("").to_string(),
        })
    }

    /// One classification attempt. The failure path here is the only
    /// retry driver: retryable errors mark the ticket FAILED_RETRYING
    /// and enqueue it before propagating.
    fn attempt(&self, ticket_id: &str) -> ClassifyResult<ClassificationResult> {
        let request = self.build_request(ticket_id)?;

        match self.client.classify(&request) {
            Ok(result) => {
                self.apply(ticket_id, &result);
                Ok(result)
            }
            Err(e) if e.retryable() => {
                self.store.update_node_property(
                    ticket_id,
                    "classificationStatus",
                    ClassificationStatus::FailedRetrying.as_str(),
                );
                warn!(ticket = %ticket_id, error = %e, "classification failed, queued for retry");
                let _ = self.retry_tx.send(ticket_id.to_string());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Confidence gate. At or above the threshold the result is applied:
    /// ticket scalars updated and the BELONGS_TO edge replaced. Below it
    /// the ticket is routed to manual review and nothing else changes.
    fn apply(&self, ticket_id: &str, result: &ClassificationResult) {
        if result.confidence < self.config.confidence_threshold {
            self.store.update_node_property(
                ticket_id,
                "classificationStatus",
                ClassificationStatus::NeedsReview.as_str(),
            );
            info!(
                ticket = %ticket_id,
                confidence = result.confidence,
                threshold = self.config.confidence_threshold,
                "confidence below threshold, routed to review"
            );
            return;
        }

        let category = self
            .sync
            .resolve_category(&result.predicted_category)
            .or_else(|| self.sync.resolve_category(&result.category_name));

        let Some(category) = category else {
            // A prediction we can't map onto the graph is a review case,
            // not an error.
            warn!(
                ticket = %ticket_id,
                predicted = %result.predicted_category,
                "predicted category unknown, routed to review"
            );
            self.store.update_node_property(
                ticket_id,
                "classificationStatus",
                ClassificationStatus::NeedsReview.as_str(),
            );
            return;
        };

        let classified_at = result.timestamp.clone().unwrap_or_else(now_rfc3339);
        self.store.update_node_properties(
            ticket_id,
            &[
                ("category", category.id.clone().into()),
                ("predictedCategory", result.predicted_category.clone().into()),
                ("confidence", result.confidence.into()),
                ("classifiedAt", classified_at.into()),
                ("autoClassified", true.into()),
                (
                    "classificationStatus",
                    ClassificationStatus::Classified.as_str().into(),
                ),
            ],
        );
        self.sync
            .relink_category(ticket_id, &category.id, result.confidence, true);

        info!(
            ticket = %ticket_id,
            category = %category.id,
            confidence = result.confidence,
            "classification applied"
        );
    }
}

/// Drives classification against the external scorer.
///
/// Construct once at process start; worker threads live until
/// `shutdown`, which is also invoked on drop.
pub struct ClassificationGateway {
    inner: Arc<GatewayInner>,
    jobs: Option<Sender<Job>>,
    shutdown_tx: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl ClassificationGateway {
    pub fn new(
        store: Arc<GraphStore>,
        sync: Arc<RelationshipSynchronizer>,
        client: ScorerClient,
        config: ClassificationConfig,
    ) -> Self {
        let workers = config.workers.max(1);
        // Bounded queue: submitting past capacity blocks the caller.
        let (jobs_tx, jobs_rx) = bounded::<Job>(workers);
        let (retry_tx, retry_rx) = unbounded::<String>();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let inner = Arc::new(GatewayInner {
            store,
            sync,
            client,
            config,
            retry_tx,
        });

        let mut handles = Vec::with_capacity(workers + 1);
        for i in 0..workers {
            let inner = Arc::clone(&inner);
            let rx = jobs_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("classify-{i}"))
                .spawn(move || worker_loop(inner, rx))
                .expect("spawn classification worker");
            handles.push(handle);
        }

        {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name("classify-retry".to_string())
                .spawn(move || retry_loop(inner, retry_rx, shutdown_rx))
                .expect("spawn retry worker");
            handles.push(handle);
        }

        Self {
            inner,
            jobs: Some(jobs_tx),
            shutdown_tx: Some(shutdown_tx),
            handles,
        }
    }

    /// Classify one ticket synchronously. Transport and protocol errors
    /// propagate to the caller (after driving the retry queue); the
    /// confidence gate decides what an accepted result does.
    pub fn classify(&self, ticket_id: &str) -> ClassifyResult<ClassificationResult> {
        self.inner.store.update_node_property(
            ticket_id,
            "classificationStatus",
            ClassificationStatus::Pending.as_str(),
        );
        self.inner.attempt(ticket_id)
    }

    /// Submit a ticket to the worker pool. The health gate runs first:
    /// an unavailable scorer resolves the handle to `None` immediately,
    /// without contacting the scorer or enqueueing a retry — the ticket
    /// stays where it was, awaiting manual triage or a later attempt.
    pub fn classify_async(&self, ticket_id: &str) -> ClassifyHandle {
        let Some(jobs) = &self.jobs else {
            return ClassifyHandle::resolved(None);
        };

        if !self.inner.client.healthy() {
            debug!(ticket = %ticket_id, "scorer unavailable, skipping classification");
            return ClassifyHandle::resolved(None);
        }

        self.inner.store.update_node_property(
            ticket_id,
            "classificationStatus",
            ClassificationStatus::Pending.as_str(),
        );

        let (done_tx, done_rx) = bounded(1);
        let job = Job {
            ticket_id: ticket_id.to_string(),
            done: done_tx,
        };
        if jobs.send(job).is_err() {
            return ClassifyHandle::resolved(None);
        }

        ClassifyHandle { rx: done_rx }
    }

    /// Fan out async classification over a batch and await completion of
    /// all submissions. Returns how many were classified. No ordering
    /// guarantee across tickets.
    pub fn batch_classify(&self, ticket_ids: &[String]) -> usize {
        let handles: Vec<ClassifyHandle> = ticket_ids
            .iter()
            .map(|id| self.classify_async(id))
            .collect();

        // Awaiting sequentially is fine; the workers run in parallel.
        let classified = handles
            .into_iter()
            .filter(|handle| handle.rx.recv().ok().flatten().is_some())
            .count();

        info!(
            submitted = ticket_ids.len(),
            classified, "batch classification finished"
        );
        classified
    }

    /// Set a ticket's category by hand, superseding any prior automatic
    /// classification. The replacement edge carries confidence 1.0 and
    /// `autoClassified=false`.
    pub fn override_classification(
        &self,
        ticket_id: &str,
        category_key: &str,
    ) -> ClassifyResult<()> {
        let store = &self.inner.store;

        store
            .get_node(ticket_id)
            .filter(|n| n.kind == NodeKind::Ticket)
            .ok_or_else(|| ClassifyError::TicketNotFound(ticket_id.to_string()))?;

        let category = self
            .inner
            .sync
            .resolve_category(category_key)
            .ok_or_else(|| ClassifyError::CategoryNotFound(category_key.to_string()))?;

        store.update_node_properties(
            ticket_id,
            &[
                ("category", category.id.clone().into()),
                ("confidence", 1.0.into()),
                ("classifiedAt", now_rfc3339().into()),
                ("autoClassified", false.into()),
                (
                    "classificationStatus",
                    ClassificationStatus::Classified.as_str().into(),
                ),
            ],
        );
        self.inner
            .sync
            .relink_category(ticket_id, &category.id, 1.0, false);

        info!(ticket = %ticket_id, category = %category.id, "classification overridden");
        Ok(())
    }

    /// Aggregate counts per classification status.
    pub fn statistics(&self) -> ClassificationStats {
        let tickets = self.inner.store.get_nodes_by_kind(NodeKind::Ticket);

        let mut stats = ClassificationStats {
            total: tickets.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0.0f64;
        let mut confidence_count = 0usize;

        for ticket in &tickets {
            let status = ticket
                .get_str("classificationStatus")
                .and_then(ClassificationStatus::parse)
                .unwrap_or_default();
            match status {
                ClassificationStatus::Unclassified => stats.unclassified += 1,
                ClassificationStatus::Pending => stats.pending += 1,
                ClassificationStatus::Classified => stats.classified += 1,
                ClassificationStatus::NeedsReview => stats.needs_review += 1,
                ClassificationStatus::FailedRetrying => stats.failed_retrying += 1,
            }

            if ticket.get_bool("autoClassified").unwrap_or(false) {
                stats.auto_classified += 1;
                if let Some(confidence) = ticket.get_f64("confidence") {
                    confidence_sum += confidence;
                    confidence_count += 1;
                }
            }
        }

        if confidence_count > 0 {
            stats.mean_confidence = Some(confidence_sum / confidence_count as f64);
        }
        stats
    }

    /// Stop accepting work, signal the retry worker, and join every
    /// thread. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        self.shutdown_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ClassificationGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: Arc<GatewayInner>, jobs: Receiver<Job>) {
    // Exits when the job sender is dropped at shutdown.
    while let Ok(job) = jobs.recv() {
        let result = match inner.attempt(&job.ticket_id) {
            Ok(result) => Some(result),
            Err(e) => {
                debug!(ticket = %job.ticket_id, error = %e, "async classification unresolved");
                None
            }
        };
        let _ = job.done.send(result);
    }
}

/// Drains the retry queue sequentially: block on the queue, back off
/// before each re-attempt, and re-check scorer health first — a still
/// unhealthy scorer requeues the ticket rather than burning the attempt.
/// The shutdown channel interrupts both the poll and the backoff sleep.
fn retry_loop(inner: Arc<GatewayInner>, retry_rx: Receiver<String>, shutdown_rx: Receiver<()>) {
    loop {
        select! {
            recv(retry_rx) -> msg => {
                let Ok(ticket_id) = msg else { break };

                // Backoff doubles as a shutdown wait.
                match shutdown_rx.recv_timeout(inner.config.retry_backoff()) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                if !inner.client.healthy() {
                    debug!(ticket = %ticket_id, "scorer still unhealthy, requeueing");
                    let _ = inner.retry_tx.send(ticket_id);
                    continue;
                }

                match inner.attempt(&ticket_id) {
                    Ok(_) => info!(ticket = %ticket_id, "retry classification succeeded"),
                    // attempt() already requeued retryable failures.
                    Err(e) => debug!(ticket = %ticket_id, error = %e, "retry attempt failed"),
                }
            }
            recv(shutdown_rx) -> _ => break,
            default(inner.config.retry_poll()) => continue,
        }
    }
}
