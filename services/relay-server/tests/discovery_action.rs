//! Integration tests for peer discovery and signal mailboxes.
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

async fn post_relay(client: &reqwest::Client, addr: SocketAddr, body: Value) -> reqwest::Response {
    client
        .post(format!("http://{addr}/api/relay"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn second_registration_under_different_peer_is_rejected_then_refresh_succeeds() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let register = |peer_id: &str| {
        json!({ "action": "register", "inviteCode": "Zx9Qm2Lp", "peerId": peer_id })
    };

    let resp = post_relay(&client, addr, register("peer-a")).await;
    assert_eq!(resp.status(), 200);

    let resp = post_relay(&client, addr, register("peer-b")).await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invite_code_in_use");

    let resp = post_relay(&client, addr, register("peer-a")).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn lookup_on_unregistered_invite_code_is_not_found() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let resp = post_relay(
        &client,
        addr,
        json!({ "action": "lookup", "inviteCode": "Nq4Wb8Yt" }),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "peer_not_found");
}

#[tokio::test]
async fn signal_poll_drains_the_mailbox_fifo() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let signal = |kind: &str| {
        json!({ "action": "signal", "from": "peer-a", "to": "peer-b", "type": kind, "payload": { "sdp": kind } })
    };

    let resp = post_relay(&client, addr, signal("offer")).await;
    assert_eq!(resp.status(), 200);
    let resp = post_relay(&client, addr, signal("ice-candidate")).await;
    assert_eq!(resp.status(), 200);

    let resp = post_relay(&client, addr, json!({ "action": "poll", "peerId": "peer-b" })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "offer");
    assert_eq!(messages[1]["type"], "ice-candidate");

    let resp = post_relay(&client, addr, json!({ "action": "poll", "peerId": "peer-b" })).await;
    let body: Value = resp.json().await.unwrap();
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn signal_rejects_unknown_type() {
    let addr = make_server().await;
    let client = reqwest::Client::new();

    let resp = post_relay(
        &client,
        addr,
        json!({ "action": "signal", "from": "peer-a", "to": "peer-b", "type": "hangup", "payload": {} }),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_signal_type");
}
