//! End-to-end exercise against a running server.
//!
//! Start the server (`cargo run -p twr-server`) with a reference snapshot
//! loaded, then run with `cargo test -p twr-server -- --ignored`.
//! Override the target with `TWR_TEST_URL`.

use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("TWR_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore]
async fn health_endpoint_responds() {
    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("server reachable");
    assert!(res.status().is_success());
}

#[tokio::test]
#[ignore]
async fn enqueue_then_decide_produces_an_audit_entry() {
    let client = reqwest::Client::new();
    let base = base_url();

    let flights: Value = client
        .get(format!("{}/v1/flights", base))
        .send()
        .await
        .expect("server reachable")
        .json()
        .await
        .expect("json body");
    let flight = flights
        .as_array()
        .and_then(|a| a.first())
        .and_then(|f| f["flight"].as_str())
        .expect("at least one flight plan loaded")
        .to_string();

    let res = client
        .post(format!("{}/v1/queue", base))
        .json(&json!({ "flight": flight, "kind": "takeoff" }))
        .send()
        .await
        .expect("enqueue request");
    assert!(
        res.status().as_u16() == 201 || res.status().as_u16() == 409,
        "unexpected enqueue status {}",
        res.status()
    );

    let decision: Value = client
        .post(format!("{}/v1/decisions", base))
        .json(&json!({}))
        .send()
        .await
        .expect("decision request")
        .json()
        .await
        .expect("json body");
    assert_eq!(decision["status"], "decided");

    let audit: Value = client
        .get(format!("{}/v1/audit?limit=5", base))
        .send()
        .await
        .expect("audit request")
        .json()
        .await
        .expect("json body");
    assert!(!audit.as_array().unwrap().is_empty());
}
