//! Integration tests for the `/api/v1/sessions` WebRTC handshake surface.
use std::net::SocketAddr;

use relay_server::config::Config;
use relay_server::state::AppState;
use serde_json::{json, Value};

async fn make_server() -> SocketAddr {
    let mut config = Config::from_env();
    config.bind_addr = "127.0.0.1:0".to_owned();
    let state = AppState::new(config).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let router = relay_server::build_router(state);
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn envelope(session_id: &str) -> Value {
    json!({
        "envelope": {
            "v": 1,
            "sessionId": session_id,
            "nonceB64": "AAAAAAAAAAAAAAAA",
            "ctB64": "AAAAAAAAAAAAAAAAAAAAAA==",
        }
    })
}

#[tokio::test]
async fn create_resolve_offer_answer_one_shot_handshake() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let created: Value = resp.json().await.unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_owned();
    let pin = created["pin"].as_str().unwrap().to_owned();

    let resp = client
        .get(format!("http://{addr}/api/v1/sessions/resolve?pin={pin}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resolved: Value = resp.json().await.unwrap();
    assert_eq!(resolved["sessionId"], session_id);

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions/{session_id}/offer"))
        .json(&envelope(&session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("http://{addr}/api/v1/sessions/{session_id}/offer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions/{session_id}/answer"))
        .json(&envelope(&session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // First read of the answer succeeds and delivers the ciphertext.
    let resp = client
        .get(format!("http://{addr}/api/v1/sessions/{session_id}/answer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Second read observes the one-shot force-expire.
    let resp = client
        .get(format!("http://{addr}/api/v1/sessions/{session_id}/answer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 410);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "session_expired");
}

#[tokio::test]
async fn answer_before_offer_is_rejected() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions"))
        .send()
        .await
        .unwrap();
    let created: Value = resp.json().await.unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_owned();

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions/{session_id}/answer"))
        .json(&envelope(&session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "offer_not_set");
}

#[tokio::test]
async fn delete_is_idempotent_and_unknown_session_is_not_found() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/api/v1/sessions"))
        .send()
        .await
        .unwrap();
    let created: Value = resp.json().await.unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_owned();

    let resp = client
        .delete(format!("http://{addr}/api/v1/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .delete(format!("http://{addr}/api/v1/sessions/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("http://{addr}/api/v1/sessions/{session_id}/offer"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "session_not_found");
}
