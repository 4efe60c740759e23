use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use harness_dispatch::{DispatchOutcome, ErrorResponse, Location, TargetRef};
use serde::Serialize;
use std::sync::Arc;

use crate::HarnessServerState;

pub(crate) async fn handle_client_command(
    State(state): State<Arc<HarnessServerState>>,
    Path(client_id): Path<String>,
    body: Bytes,
) -> Response {
    let outcome = state
        .dispatcher()
        .dispatch(TargetRef::Client(client_id), &body)
        .await;
    dispatch_response(outcome)
}

pub(crate) async fn handle_location_command(
    State(state): State<Arc<HarnessServerState>>,
    Path((command, id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let outcome = state
        .dispatcher()
        .dispatch(TargetRef::Command { command, id }, &body)
        .await;
    dispatch_response(outcome)
}

fn dispatch_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Success { location, response } => created_response(&location, response),
        DispatchOutcome::Failure(error) => failure_response(error),
    }
}

/// 201 with a `Location` header pointing at the stored entity. A location
/// that cannot be carried in a header is reported as a failure, never as a
/// bare 201.
pub(crate) fn created_response(location: &Location, body: impl Serialize) -> Response {
    let value = match HeaderValue::from_str(&location.to_string()) {
        Ok(value) => value,
        Err(error) => {
            tracing::error!(%location, %error, "location is not a valid header value");
            return failure_response(ErrorResponse::new(
                format!("location '{location}' is not a valid header value"),
                false,
                "",
            ));
        }
    };
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    response.headers_mut().insert(LOCATION, value);
    response
}

/// Invocation faults keep a 200 status; the body carries the error.
pub(crate) fn failure_response(error: ErrorResponse) -> Response {
    (StatusCode::OK, Json(error)).into_response()
}
