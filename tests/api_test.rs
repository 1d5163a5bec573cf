use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use evidence_ledger::api::{router, AppState};
use evidence_ledger::config::AppConfig;
use evidence_ledger::crypto::digest;

mod common;
use common::*;

fn test_app() -> Router {
    router(AppState::new(memory_ledger(), AppConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn report_payload(files: &[&[u8]]) -> Value {
    titled_payload("Broken water main", files)
}

fn titled_payload(title: &str, files: &[&[u8]]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            json!({
                "filename": format!("evidence{}.jpg", i),
                "mime_type": "image/jpeg",
                "content_base64": STANDARD.encode(bytes),
            })
        })
        .collect();
    json!({
        "title": title,
        "uploader": "resident",
        "description": "Water flowing onto the street",
        "location": "5th and Main",
        "time": "2024-04-02T07:15:00Z",
        "files": files,
    })
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    for uri in ["/", "/api/health"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}

#[tokio::test]
async fn test_submit_and_fetch_block() {
    let app = test_app();
    let (status, body) = send(
        &app,
        post_json("/api/report", report_payload(&[b"photo", b"clip"])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["block"]["index"], 0);
    assert_eq!(body["evidence"].as_array().unwrap().len(), 2);
    assert_eq!(body["evidence"][0]["digest"], digest(b"photo").to_hex());

    let (status, body) = send(&app, get("/api/block/0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["block"]["previous_hash"], "0".repeat(64));
    assert_eq!(body["transactions"][0]["title"], "Broken water main");

    let (status, body) = send(&app, get("/api/explorer")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_rejects_missing_files() {
    let app = test_app();
    let (status, body) = send(&app, post_json("/api/report", report_payload(&[]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let mut payload = report_payload(&[b"x"]);
    payload["files"][0]["content_base64"] = json!("not base64!!");
    let (status, _) = send(&app, post_json("/api/report", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_block_is_not_found() {
    let app = test_app();
    let (status, _) = send(&app, get("/api/block/7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_proof_round_trip_over_http() {
    let app = test_app();
    send(
        &app,
        post_json("/api/report", report_payload(&[b"a", b"b", b"c"])),
    )
    .await;

    let leaf = digest(b"c").to_hex();
    let (status, proof) = send(&app, get(&format!("/api/block/0/proof?leaf={}", leaf))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proof["leaf"], leaf);

    let (status, body) = send(
        &app,
        post_json(
            "/api/block/0/verify-proof",
            json!({ "leaf": leaf, "proof": proof["proof"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (_, body) = send(
        &app,
        post_json(
            "/api/block/0/verify-proof",
            json!({ "leaf": digest(b"z").to_hex(), "proof": proof["proof"] }),
        ),
    )
    .await;
    assert_eq!(body["valid"], false);

    let (status, body) = send(
        &app,
        post_json("/api/block/0/verify-proof", json!({ "leaf": "zz", "proof": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn test_verify_file_and_chain() {
    let app = test_app();
    send(&app, post_json("/api/report", report_payload(&[b"kept"]))).await;

    let (status, body) = send(
        &app,
        post_json("/api/verify", json!({ "content_base64": STANDARD.encode(b"kept") })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
    assert_eq!(body["locations"][0]["block_index"], 0);

    let (_, body) = send(
        &app,
        post_json("/api/verify", json!({ "content_base64": STANDARD.encode(b"other") })),
    )
    .await;
    assert_eq!(body["verified"], false);

    let (status, body) = send(&app, get("/api/chain/verify")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["block_count"], 1);
}

#[tokio::test]
async fn test_search_reports() {
    let app = test_app();
    send(&app, post_json("/api/report", titled_payload("Fallen tree", &[b"1"]))).await;
    send(&app, post_json("/api/report", titled_payload("Blocked drain", &[b"2"]))).await;

    let (status, body) = send(&app, get("/api/search?q=TREE")).await;
    assert_eq!(status, StatusCode::OK);
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Fallen tree");
    assert_eq!(found[0]["block_index"], 0);

    // Both payloads share the same description
    let (_, body) = send(&app, get("/api/search?q=flowing")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/api/search?q=volcano")).await;
    assert!(body.as_array().unwrap().is_empty());
}
