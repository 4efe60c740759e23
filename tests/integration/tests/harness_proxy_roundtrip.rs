use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::join_all;
use harness_server::{build_harness_router, HarnessServerConfig, HarnessServerState};
use httpmock::Method::GET;
use httpmock::MockServer;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const CONCURRENT_INVOCATIONS: usize = 32;

async fn spawn_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let app = build_harness_router(Arc::new(HarnessServerState::new(
        HarnessServerConfig::default(),
    )));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve harness proxy");
    });
    addr
}

async fn post(
    http: &Client,
    addr: SocketAddr,
    path: &str,
    body: Value,
) -> (StatusCode, Option<String>, Value) {
    let response = http
        .post(format!("http://{addr}/{path}"))
        .json(&body)
        .send()
        .await
        .expect("send request");
    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.json::<Value>().await.expect("json body");
    (status, location, body)
}

fn config_body() -> Value {
    json!({
        "features": {},
        "variables": {
            "string-var": {
                "_id": "638681f059f1b81cc9e6c7fc",
                "key": "string-var",
                "type": "String",
                "value": "string"
            }
        }
    })
}

async fn create_local_client(http: &Client, addr: SocketAddr, cdn: &MockServer, client_id: &str) {
    let (status, location, body) = post(
        http,
        addr,
        "client",
        json!({
            "clientId": client_id,
            "sdkKey": "dvc_server_integration",
            "waitForInitialization": true,
            "options": {"configCDNURI": cdn.base_url()}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some(format!("client/{client_id}").as_str()));
    assert_eq!(body, json!({"message": "success"}));
}

fn variable_command(key: &str, default_value: Value) -> Value {
    json!({
        "command": "variable",
        "user": {"user_id": "integration-user"},
        "params": [{"type": "user"}, {"value": key}, {"value": default_value}]
    })
}

#[tokio::test]
async fn integration_driver_flow_creates_client_and_chains_commands() {
    let cdn = MockServer::start_async().await;
    cdn.mock(|when, then| {
        when.method(GET)
            .path("/config/v1/server/dvc_server_integration.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(config_body().to_string());
    });
    let addr = spawn_proxy().await;
    let http = Client::new();
    create_local_client(&http, addr, &cdn, "abc").await;

    let (status, location, body) = post(
        &http,
        addr,
        "client/abc",
        variable_command("string-var", json!("default")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some("command/variable/0"));
    assert_eq!(body["entityType"], "Variable");
    assert_eq!(body["data"]["value"], "string");
    assert_eq!(body["data"]["isDefaulted"], false);
    assert_eq!(body["logs"], json!([]));

    let (_, location, body) = post(
        &http,
        addr,
        "client/abc",
        variable_command("string-var", json!(1)),
    )
    .await;
    assert_eq!(location.as_deref(), Some("command/variable/1"));
    assert_eq!(body["data"]["isDefaulted"], true);
    assert_eq!(body["data"]["eval"]["details"], "Variable Type Mismatch");

    let (status, location, body) = post(
        &http,
        addr,
        "command/variable/0",
        json!({"command": "Key"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(location.as_deref(), Some("command/Key/0"));
    assert_eq!(body, json!({"entityType": "Object", "data": "string-var", "logs": []}));

    let (status, location, body) = post(
        &http,
        addr,
        "client/missing",
        variable_command("string-var", json!("default")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(location.is_none());
    assert_eq!(body["exception"], "entity not found: client/missing");

    let spec = http
        .get(format!("http://{addr}/spec"))
        .send()
        .await
        .expect("spec request")
        .json::<Value>()
        .await
        .expect("spec body");
    assert_eq!(spec["name"], "Rust");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn integration_concurrent_invocations_receive_distinct_contiguous_addresses() {
    let cdn = MockServer::start_async().await;
    cdn.mock(|when, then| {
        when.method(GET)
            .path("/config/v1/server/dvc_server_integration.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(config_body().to_string());
    });
    let addr = spawn_proxy().await;
    let http = Client::new();
    create_local_client(&http, addr, &cdn, "concurrent").await;

    let requests = (0..CONCURRENT_INVOCATIONS).map(|_| {
        let http = http.clone();
        tokio::spawn(async move {
            post(
                &http,
                addr,
                "client/concurrent",
                variable_command("string-var", json!("default")),
            )
            .await
        })
    });
    let mut sequences = BTreeSet::new();
    for joined in join_all(requests).await {
        let (status, location, _) = joined.expect("request task");
        assert_eq!(status, StatusCode::CREATED);
        let location = location.expect("location header");
        let sequence = location
            .strip_prefix("command/variable/")
            .and_then(|raw| raw.parse::<usize>().ok())
            .expect("sequence suffix");
        assert!(sequences.insert(sequence), "duplicate address {location}");
    }

    assert_eq!(
        sequences.into_iter().collect::<Vec<_>>(),
        (0..CONCURRENT_INVOCATIONS).collect::<Vec<_>>()
    );
}
