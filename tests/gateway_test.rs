//! Gateway tests against a minimal HTTP scorer stand-in.
//!
//! The stub speaks just enough HTTP/1.1 for ureq: it reads one request
//! per connection and answers `/health` and `/classify` with canned
//! behavior. Retry intervals are configured in milliseconds so these
//! tests don't lean on wall-clock timing.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deskgraph::classify::{ClassificationGateway, ScorerClient};
use deskgraph::config::{ClassificationConfig, ScorerConfig, SyncConfig};
use deskgraph::graph::{EdgeKind, GraphNode, GraphStore};
use deskgraph::sync::RelationshipSynchronizer;

/// Spawn a scorer stub. `healthy` controls `/health`; the first
/// `fail_first` calls to `/classify` return a 500, the rest return
/// `response`.
fn spawn_scorer(healthy: bool, fail_first: usize, response: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind scorer stub");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

    std::thread::spawn(move || {
        let mut remaining_failures = fail_first;
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let _ = handle(&mut stream, healthy, &mut remaining_failures, response);
        }
    });

    base_url
}

fn handle(
    stream: &mut TcpStream,
    healthy: bool,
    remaining_failures: &mut usize,
    response: &str,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;
    }

    let (status, body) = if request_line.starts_with("GET /health") {
        if healthy {
            ("200 OK", "{}".to_string())
        } else {
            ("503 Service Unavailable", "{}".to_string())
        }
    } else if request_line.starts_with("POST /classify") {
        if *remaining_failures > 0 {
            *remaining_failures -= 1;
            ("500 Internal Server Error", r#"{"error":"boom"}"#.to_string())
        } else {
            ("200 OK", response.to_string())
        }
    } else {
        ("404 Not Found", "{}".to_string())
    };

    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(reply.as_bytes())?;
    stream.flush()
}

fn setup(base_url: &str) -> (Arc<GraphStore>, ClassificationGateway) {
    let store = Arc::new(GraphStore::in_memory());
    store.upsert_node(GraphNode::category("C1", "Billing"));
    store.upsert_node(GraphNode::category("C2", "Hardware"));
    store.upsert_node(
        GraphNode::ticket("T1", "Invoice shows double charge")
            .with_property("description", "Customer billed twice")
            .with_property("priority", "high"),
    );

    let sync = Arc::new(RelationshipSynchronizer::new(
        Arc::clone(&store),
        SyncConfig::default(),
    ));
    let client = ScorerClient::new(&ScorerConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
    });
    let gateway = ClassificationGateway::new(
        Arc::clone(&store),
        sync,
        client,
        ClassificationConfig {
            confidence_threshold: 0.75,
            workers: 3,
            retry_poll_ms: 50,
            retry_backoff_ms: 10,
        },
    );
    (store, gateway)
}

fn wait_for_status(store: &GraphStore, ticket_id: &str, status: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if store
            .get_node(ticket_id)
            .and_then(|t| t.get_str("classificationStatus").map(str::to_string))
            .as_deref()
            == Some(status)
        {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

const CONFIDENT: &str =
    r#"{"predictedCategory":"C1","categoryName":"Billing","confidence":0.82,"alternatives":[{"categoryId":"C2","categoryName":"Hardware","confidence":0.11}],"timestamp":"2026-06-01T12:00:00Z"}"#;

const HESITANT: &str =
    r#"{"predictedCategory":"C1","categoryName":"Billing","confidence":0.40}"#;

#[test]
fn test_sync_classify_applies_confident_result() {
    let base_url = spawn_scorer(true, 0, CONFIDENT);
    let (store, gateway) = setup(&base_url);

    let result = gateway.classify("T1").expect("classify");
    assert_eq!(result.predicted_category, "C1");
    assert_eq!(result.alternatives.len(), 1);

    let ticket = store.get_node("T1").unwrap();
    assert_eq!(ticket.get_str("category"), Some("C1"));
    assert_eq!(ticket.get_str("classificationStatus"), Some("CLASSIFIED"));
    assert_eq!(ticket.get_bool("autoClassified"), Some(true));

    let edge = store.edge_between("T1", "C1", EdgeKind::BelongsTo).unwrap();
    assert_eq!(edge.get_f64("confidence"), Some(0.82));
    assert_eq!(edge.get_bool("autoClassified"), Some(true));
}

#[test]
fn test_async_classify_below_threshold_needs_review() {
    let base_url = spawn_scorer(true, 0, HESITANT);
    let (store, gateway) = setup(&base_url);

    let result = gateway.classify_async("T1").wait();
    // The call succeeded; the gate routed it to review.
    assert!(result.is_some());

    let ticket = store.get_node("T1").unwrap();
    assert_eq!(ticket.get_str("category"), None);
    assert_eq!(ticket.get_str("classificationStatus"), Some("NEEDS_REVIEW"));
    assert_eq!(store.count_edges(EdgeKind::BelongsTo), 0);
}

#[test]
fn test_failed_classification_recovers_through_retry_queue() {
    // First /classify call fails, every later one succeeds.
    let base_url = spawn_scorer(true, 1, CONFIDENT);
    let (store, gateway) = setup(&base_url);

    let result = gateway.classify_async("T1").wait();
    assert!(result.is_none(), "first attempt must fail");
    // The retry worker may already be re-attempting by now.
    let status = store
        .get_node("T1")
        .unwrap()
        .get_str("classificationStatus")
        .map(str::to_string);
    assert!(
        matches!(status.as_deref(), Some("FAILED_RETRYING") | Some("CLASSIFIED")),
        "unexpected status {status:?}"
    );

    // The retry worker picks it up and lands the classification.
    assert!(
        wait_for_status(&store, "T1", "CLASSIFIED", Duration::from_secs(10)),
        "retry never classified the ticket"
    );
    assert!(store.has_edge("T1", "C1", EdgeKind::BelongsTo));
}

#[test]
fn test_unhealthy_scorer_is_a_terminal_noop() {
    let base_url = spawn_scorer(false, 0, CONFIDENT);
    let (store, gateway) = setup(&base_url);

    let result = gateway.classify_async("T1").wait();
    assert!(result.is_none());

    // No status change, no retry enqueued: the ticket just waits.
    let ticket = store.get_node("T1").unwrap();
    assert_eq!(ticket.get_str("classificationStatus"), None);
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(
        store.get_node("T1").unwrap().get_str("classificationStatus"),
        None
    );
}

#[test]
fn test_batch_classify_reports_success_count() {
    let base_url = spawn_scorer(true, 0, CONFIDENT);
    let (store, gateway) = setup(&base_url);

    store.upsert_node(
        GraphNode::ticket("T2", "Another billing mixup").with_property("priority", "low"),
    );
    store.upsert_node(
        GraphNode::ticket("T3", "And a third one").with_property("priority", "low"),
    );

    let ids = vec!["T1".to_string(), "T2".to_string(), "T3".to_string()];
    let classified = gateway.batch_classify(&ids);
    assert_eq!(classified, 3);

    for id in ["T1", "T2", "T3"] {
        assert_eq!(
            store.get_node(id).unwrap().get_str("classificationStatus"),
            Some("CLASSIFIED")
        );
    }
    // One current classification each.
    assert_eq!(store.count_edges(EdgeKind::BelongsTo), 3);
}

#[test]
fn test_shutdown_is_deterministic_with_queued_retries() {
    // Scorer fails forever: the ticket cycles through the retry queue.
    let base_url = spawn_scorer(true, usize::MAX, CONFIDENT);
    let (store, mut gateway) = setup(&base_url);

    assert!(gateway.classify_async("T1").wait().is_none());
    assert_eq!(
        store.get_node("T1").unwrap().get_str("classificationStatus"),
        Some("FAILED_RETRYING")
    );

    // Joins the pool and the retry worker without hanging.
    gateway.shutdown();
}
