//! Issuance through the HTTP surface, with completion reported by webhook.

use super::harness::{request, Harness};
use async_trait::async_trait;
use axum::http::StatusCode;
use futures::future::join_all;
use ia_01_resource_cache::{LedgerAuthor, LedgerError, LedgerResources};
use serde_json::{json, Value};
use shared_bus::EventPublisher;
use shared_types::SchemaDefinition;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn outcome<'a>(body: &'a Value, order: usize) -> &'a Value {
    let item = &body[order];
    assert_eq!(item["order"], order, "outcome out of position: {body}");
    item
}

#[tokio::test]
async fn test_batch_with_known_and_unknown_schema() {
    let harness = Harness::start(Duration::from_secs(5));

    let (status, body) = harness
        .issue(json!([
            request("Passport", "1.0", json!({ "name": "Alice" })),
            request("Ghost", "9.9", json!({ "name": "Bob" })),
        ]))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let passport = outcome(&body, 0);
    assert_eq!(passport["outcome"], "succeeded");
    assert_eq!(passport["payload"]["state"], "done");

    let ghost = outcome(&body, 1);
    assert_eq!(ghost["outcome"], "failed");
    assert_eq!(ghost["kind"], "validation_error");
    assert!(ghost["detail"].as_str().unwrap().contains("Ghost"));

    // The unknown schema never reached the agent.
    let offers = harness.agent.offers.lock();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].connection_id, "vcr-conn");
    assert_eq!(offers[0].filter.indy.cred_def_id, "Issuer:3:CL:1:default");
}

#[tokio::test]
async fn test_single_request_gets_single_outcome() {
    let harness = Harness::start(Duration::from_secs(5));

    let (status, body) = harness
        .issue(request("Licence", "2.0", json!({ "holder": "Carol" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_object());
    assert_eq!(body["order"], 0);
    assert_eq!(body["outcome"], "succeeded");
}

#[tokio::test]
async fn test_outcomes_keep_request_order_when_completions_do_not() {
    let harness = Harness::start(Duration::from_secs(5));

    let delays = [150, 10, 80, 40];
    let batch: Vec<Value> = delays
        .iter()
        .enumerate()
        .map(|(i, delay)| {
            request(
                "Passport",
                "1.0",
                json!({ "name": format!("holder-{i}"), "delay_ms": delay }),
            )
        })
        .collect();

    let (status, body) = harness.issue(Value::Array(batch)).await;
    assert_eq!(status, StatusCode::OK);

    for order in 0..delays.len() {
        assert_eq!(outcome(&body, order)["outcome"], "succeeded");
    }
    assert_eq!(harness.correlator.stats().resolved, delays.len() as u64);
    assert_eq!(harness.correlator.active_waits(), 0);
}

#[tokio::test]
async fn test_progress_webhook_does_not_settle_the_exchange() {
    let harness = Harness::start(Duration::from_secs(5));

    let (_, body) = harness
        .issue(request(
            "Passport",
            "1.0",
            json!({ "name": "Dana", "progress": true }),
        ))
        .await;

    assert_eq!(body["outcome"], "succeeded");
    assert_eq!(body["payload"]["state"], "done");
    // Only the terminal notification reached the bus.
    assert_eq!(harness.bus.events_published(), 1);
    assert_eq!(harness.correlator.stats().unmatched, 0);
}

#[tokio::test]
async fn test_abandoned_exchange_is_agent_reported_error() {
    let harness = Harness::start(Duration::from_secs(5));

    let (_, body) = harness
        .issue(json!([
            request("Passport", "1.0", json!({ "name": "Eve", "final_state": "abandoned" })),
            request("Licence", "2.0", json!({ "holder": "Frank" })),
        ]))
        .await;

    let abandoned = outcome(&body, 0);
    assert_eq!(abandoned["outcome"], "failed");
    assert_eq!(abandoned["kind"], "agent_reported_error");
    assert_eq!(abandoned["body"]["state"], "abandoned");

    assert_eq!(outcome(&body, 1)["outcome"], "succeeded");
}

#[tokio::test]
async fn test_late_completion_after_timeout_is_a_duplicate() {
    let harness = Harness::start(Duration::from_millis(50));

    let (_, body) = harness
        .issue(request(
            "Passport",
            "1.0",
            json!({ "name": "Grace", "delay_ms": 250 }),
        ))
        .await;
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["kind"], "timeout_error");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats = harness.correlator.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.resolved, 0);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test]
async fn test_one_bad_element_does_not_disturb_the_batch() {
    let harness = Harness::start(Duration::from_secs(5));

    let (status, body) = harness
        .issue(json!([
            request("Passport", "1.0", json!({ "name": "Heidi" })),
            { "schema_name": "Passport" },
            request("Passport", "1.0", json!({ "name": null })),
            request("Licence", "2.0", json!({ "holder": "Ivan" })),
        ]))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome(&body, 0)["outcome"], "succeeded");
    assert_eq!(outcome(&body, 1)["kind"], "validation_error");
    assert_eq!(outcome(&body, 2)["kind"], "validation_error");
    assert_eq!(outcome(&body, 3)["outcome"], "succeeded");
    assert_eq!(harness.agent.offers.lock().len(), 2);
}

#[tokio::test]
async fn test_scalar_body_is_rejected_before_dispatch() {
    let harness = Harness::start(Duration::from_secs(5));

    let (status, body) = harness.issue(json!("not a request")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed_input");
    assert!(harness.agent.offers.lock().is_empty());
}

#[tokio::test]
async fn test_empty_batch_settles_immediately() {
    let harness = Harness::start(Duration::from_secs(5));

    let (status, body) = harness.issue(json!([])).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

// =============================================================================
// LEDGER RESOURCES
// =============================================================================

/// Ledger that knows nothing and takes a while to publish.
#[derive(Default)]
struct SlowLedger {
    cred_def_creates: AtomicUsize,
}

#[async_trait]
impl LedgerAuthor for SlowLedger {
    async fn find_schema(&self, _: &str, _: &str) -> Result<Option<String>, LedgerError> {
        Ok(None)
    }

    async fn create_schema(&self, definition: &SchemaDefinition) -> Result<String, LedgerError> {
        Ok(format!("Issuer:2:{}:{}", definition.schema_name, definition.schema_version))
    }

    async fn find_credential_definition(&self, _: &str) -> Result<Option<String>, LedgerError> {
        Ok(None)
    }

    async fn create_credential_definition(
        &self,
        schema_id: &str,
        tag: &str,
        _support_revocation: bool,
    ) -> Result<String, LedgerError> {
        self.cred_def_creates.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(format!("{schema_id}:3:CL:{tag}"))
    }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_credential_definition() {
    let author = Arc::new(SlowLedger::default());
    let ledger = Arc::new(LedgerResources::new(Arc::clone(&author)));

    let results = join_all((0..16).map(|_| {
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move { ledger.ensure_credential_definition("Issuer:2:Passport:1.0").await })
    }))
    .await;

    for result in results {
        assert_eq!(
            result.unwrap().unwrap(),
            "Issuer:2:Passport:1.0:3:CL:default"
        );
    }
    assert_eq!(author.cred_def_creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        ledger
            .cached_credential_definition("Issuer:2:Passport:1.0")
            .as_deref(),
        Some("Issuer:2:Passport:1.0:3:CL:default")
    );
}
