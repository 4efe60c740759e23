//! Client creation and teardown endpoints.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use harness_dispatch::{fault, DispatchError, ErrorResponse, Location};
use harness_sdk::{BucketingMode, ClientOptions, SdkClient};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

use crate::command_routes::{created_response, failure_response};
use crate::HarnessServerState;

const MISSING_CLIENT_ID: &str = "Invalid request: missing clientId";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateClientRequest {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    sdk_key: String,
    #[serde(default)]
    enable_cloud_bucketing: bool,
    #[serde(default)]
    wait_for_initialization: bool,
    #[serde(default)]
    options: ClientOptions,
}

pub(crate) async fn handle_create_client(
    State(state): State<Arc<HarnessServerState>>,
    body: Bytes,
) -> Response {
    let request = match serde_json::from_slice::<CreateClientRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid request: {error}"),
            )
                .into_response();
        }
    };
    let Some(client_id) = request
        .client_id
        .as_deref()
        .map(str::trim)
        .filter(|client_id| !client_id.is_empty())
        .map(str::to_string)
    else {
        return (StatusCode::BAD_REQUEST, MISSING_CLIENT_ID).into_response();
    };

    contained("client creation", create_client(&state, client_id, request)).await
}

/// Runs a lifecycle handler behind the fault boundary; a panic becomes the
/// usual 200 `{exception, stack}` body.
async fn contained<F>(action: &'static str, handler: F) -> Response
where
    F: Future<Output = Response>,
{
    match fault::contain(handler).await {
        Ok(response) => response,
        Err(caught) => {
            let error = DispatchError::Panic(caught.message);
            tracing::error!(action, %error, "client lifecycle handler panicked");
            failure_response(ErrorResponse::new(error.to_string(), false, caught.stack))
        }
    }
}

async fn create_client(
    state: &HarnessServerState,
    client_id: String,
    request: CreateClientRequest,
) -> Response {
    let mode = if request.enable_cloud_bucketing {
        BucketingMode::Cloud
    } else {
        BucketingMode::Local
    };
    let client = match SdkClient::new(
        &request.sdk_key,
        mode,
        request.options,
        state.sdk_request_timeout(),
    ) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            tracing::warn!(client_id = %client_id, %error, "client construction failed");
            return failure_response(ErrorResponse::new(error.to_string(), false, ""));
        }
    };

    let initialized = if request.wait_for_initialization {
        client.initialize().await
    } else {
        let background = Arc::clone(&client);
        let background_id = client_id.clone();
        tokio::spawn(async move {
            if let Err(error) = background.initialize().await {
                tracing::warn!(
                    client_id = %background_id,
                    %error,
                    "background initialization failed"
                );
            }
        });
        Ok(())
    };

    let replaced = state
        .dispatcher()
        .store()
        .register_client(&client_id, client)
        .await;
    tracing::info!(
        client_id = %client_id,
        mode = ?mode,
        replaced = replaced.is_some(),
        "client registered"
    );

    let location = Location::Client(client_id);
    match initialized {
        Ok(()) => created_response(&location, json!({ "message": "success" })),
        Err(error) => {
            tracing::warn!(%location, %error, "client initialization failed");
            created_response(&location, ErrorResponse::new(error.to_string(), true, ""))
        }
    }
}

pub(crate) async fn handle_delete_client(
    State(state): State<Arc<HarnessServerState>>,
    Path(client_id): Path<String>,
) -> Response {
    contained("client removal", delete_client(&state, client_id)).await
}

async fn delete_client(state: &HarnessServerState, client_id: String) -> Response {
    let Some(client) = state.dispatcher().store().remove_client(&client_id).await else {
        let error = DispatchError::NotFound(Location::Client(client_id).to_string());
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(error.to_string(), false, "")),
        )
            .into_response();
    };
    if let Err(error) = client.close().await {
        tracing::warn!(client_id = %client_id, %error, "client close failed");
    }
    tracing::info!(client_id = %client_id, "client removed");
    (StatusCode::OK, Json(json!({ "message": "success" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::contained;
    use crate::{build_harness_router, HarnessServerConfig, HarnessServerState};
    use axum::body::{to_bytes, Body};
    use axum::http::header::LOCATION;
    use axum::http::{Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::Router;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> Arc<HarnessServerState> {
        Arc::new(HarnessServerState::new(HarnessServerConfig {
            sdk_request_timeout_ms: 2_000,
            ..HarnessServerConfig::default()
        }))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: String) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request");
        app.clone().oneshot(request).await.expect("response")
    }

    async fn body_text(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8(body.to_vec()).expect("utf-8 body")
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).expect("json body")
    }

    fn config_body() -> Value {
        json!({
            "features": {
                "test-harness": {
                    "_id": "638680d6fcb67b96878d90e6",
                    "key": "test-harness",
                    "type": "release",
                    "_variation": "638680d6fcb67b96878d90ec",
                    "variationName": "Variation On",
                    "variationKey": "variation-on"
                }
            },
            "variables": {
                "bool-var": {
                    "_id": "638681f059f1b81cc9e6c7fa",
                    "key": "bool-var",
                    "type": "Boolean",
                    "value": true
                }
            }
        })
    }

    #[tokio::test]
    async fn functional_create_client_waits_for_config_and_evaluates_locally() {
        let cdn = MockServer::start_async().await;
        let config = cdn.mock(|when, then| {
            when.method(GET)
                .path("/config/v1/server/dvc_server_lifecycle.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(config_body().to_string());
        });
        let state = state();
        let app = build_harness_router(state.clone());

        let response = send(
            &app,
            "POST",
            "/client",
            json!({
                "clientId": "abc",
                "sdkKey": "dvc_server_lifecycle",
                "waitForInitialization": true,
                "options": {"configCDNURI": cdn.base_url()}
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("client/abc")
        );
        assert_eq!(body_json(response).await, json!({"message": "success"}));
        config.assert();

        let response = send(
            &app,
            "POST",
            "/client/abc",
            json!({
                "command": "variable",
                "user": {"user_id": "user-1"},
                "params": [{"type": "user"}, {"value": "bool-var"}, {"value": false}]
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["value"], json!(true));
        assert_eq!(body["data"]["isDefaulted"], json!(false));
        assert_eq!(state.dispatcher().store().client_count().await, 1);
    }

    #[tokio::test]
    async fn functional_failed_initialization_still_registers_client() {
        let cdn = MockServer::start_async().await;
        cdn.mock(|when, then| {
            when.method(GET).path("/config/v1/server/dvc_server_broken.json");
            then.status(500).body("cdn down");
        });
        let state = state();
        let app = build_harness_router(state.clone());

        let response = send(
            &app,
            "POST",
            "/client",
            json!({
                "clientId": "broken",
                "sdkKey": "dvc_server_broken",
                "waitForInitialization": true,
                "options": {"configCDNURI": cdn.base_url()}
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["asyncError"]
            .as_str()
            .expect("asyncError")
            .contains("500"));
        assert!(state.dispatcher().store().client("broken").await.is_some());
    }

    #[tokio::test]
    async fn regression_create_client_rejects_missing_id_and_bad_json() {
        let state = state();
        let app = build_harness_router(state.clone());

        for body in [
            json!({"sdkKey": "dvc_server_x"}),
            json!({"clientId": "", "sdkKey": "dvc_server_x"}),
            json!({"clientId": "   ", "sdkKey": "dvc_server_x"}),
        ] {
            let response = send(&app, "POST", "/client", body.to_string()).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(response).await, "Invalid request: missing clientId");
        }

        let response = send(&app, "POST", "/client", "{not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("Invalid request:"));
        assert_eq!(state.dispatcher().store().client_count().await, 0);
    }

    #[tokio::test]
    async fn regression_panicking_lifecycle_handler_returns_exception_envelope() {
        let response = contained("client removal", async {
            tokio::task::yield_now().await;
            let closed: Option<Response> = None;
            closed.expect("close exploded")
        })
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["exception"], "unhandled panic: close exploded");
        assert!(!body["stack"].as_str().expect("stack").is_empty());

        let response = contained("client removal", async {
            (StatusCode::NOT_FOUND, "gone").into_response()
        })
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn regression_invalid_sdk_key_is_reported_in_exception_envelope() {
        let state = state();
        let app = build_harness_router(state.clone());

        let response = send(
            &app,
            "POST",
            "/client",
            json!({"clientId": "abc", "sdkKey": "dvc_client_key"}).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["exception"]
            .as_str()
            .expect("exception")
            .contains("invalid sdk key"));
        assert_eq!(state.dispatcher().store().client_count().await, 0);
    }

    #[tokio::test]
    async fn functional_delete_client_flushes_events_and_removes_it() {
        let events = MockServer::start_async().await;
        let batch = events.mock(|when, then| {
            when.method(POST)
                .path("/v1/events/batch")
                .body_includes("purchase");
            then.status(201).body("{}");
        });
        let state = state();
        let app = build_harness_router(state.clone());

        let response = send(
            &app,
            "POST",
            "/client",
            json!({
                "clientId": "abc",
                "sdkKey": "dvc_server_delete",
                "options": {
                    "configCDNURI": "http://127.0.0.1:9",
                    "eventsAPIURI": events.base_url()
                }
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &app,
            "POST",
            "/client/abc",
            json!({
                "command": "track",
                "user": {"user_id": "user-1"},
                "event": {"type": "purchase"},
                "params": [{"type": "user"}, {"type": "event"}]
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, "DELETE", "/client/abc", String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "success"}));
        batch.assert();
        assert_eq!(state.dispatcher().store().client_count().await, 0);

        let response = send(&app, "DELETE", "/client/abc", String::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["exception"],
            "entity not found: client/abc"
        );
    }
}
