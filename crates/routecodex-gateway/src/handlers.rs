use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use routecodex_pipeline::PipelineOutcome;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::{EntryProtocol, build_client_request};
use crate::error_response::{bad_request_response, failover_error_response};
use crate::state::GatewayState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const ROUTE_OVERRIDE_HEADER: &str = "x-rc-route";
const DEBUG_HEADER: &str = "x-rc-debug";

pub async fn chat_completions(state: State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    handle_entry(state, headers, body, EntryProtocol::OpenAiChat).await
}

pub async fn responses(state: State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    handle_entry(state, headers, body, EntryProtocol::OpenAiResponses).await
}

pub async fn messages(state: State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    handle_entry(state, headers, body, EntryProtocol::AnthropicMessages).await
}

async fn handle_entry(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
    entry: EntryProtocol,
) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => return with_request_id(bad_request_response(&format!("invalid JSON body: {err}")), &request_id),
    };

    let header_override = headers.get(ROUTE_OVERRIDE_HEADER).and_then(|v| v.to_str().ok());
    let debug_enabled = state.debug_enabled || headers.contains_key(DEBUG_HEADER);

    let (dto, route_key) = build_client_request(entry, parsed, header_override, debug_enabled, request_id.clone(), body.len());

    info!(request_id = %request_id, route_key = route_key.as_str(), endpoint = entry.endpoint_path(), "dispatching request");

    let shadow_dto = state.shadow.as_ref().map(|_| dto.clone());
    let outcome = state
        .executor
        .run(dto, &route_key, &state.module_context)
        .await;

    if let (Some(shadow), Some(shadow_dto)) = (state.shadow.as_ref(), shadow_dto) {
        let primary_ok = outcome.is_ok();
        let primary_body = match &outcome {
            Ok(PipelineOutcome::Buffered(dto)) => Some(dto.data.clone()),
            _ => None,
        };
        shadow
            .maybe_run(shadow_dto, route_key.clone(), state.module_context.clone(), primary_ok, primary_body)
            .await;
    }

    let response = match outcome {
        Ok(PipelineOutcome::Buffered(dto)) => Json(dto.data).into_response(),
        Ok(PipelineOutcome::Streaming { body, .. }) => streaming_response(body),
        Err(err) => {
            warn!(request_id = %request_id, "request failed after failover attempts");
            failover_error_response(err)
        }
    };

    with_request_id(response, &request_id)
}

/// Relays the upstream SSE body. A mid-stream error (§7 `StreamTruncated`)
/// cannot change the status code that's already been sent, so it is
/// rendered as one more `event: error` frame and the stream ends there.
fn streaming_response(body: routecodex_pipeline::ByteStream) -> Response {
    let frames = body.map(|chunk| match chunk {
        Ok(bytes) => Ok::<Bytes, std::convert::Infallible>(bytes),
        Err(err) => {
            let payload = json!({
                "error": {
                    "type": "StreamTruncated",
                    "code": err.code,
                    "message": err.message,
                }
            });
            Ok(Bytes::from(format!("event: error\ndata: {payload}\n\n")))
        }
    });

    let mut response = Response::new(Body::from_stream(frames));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/event-stream"));
    response
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = header::HeaderValue::from_str(request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub async fn health(State(state): State<GatewayState>) -> Response {
    let summary = state.quota.summary().await;
    Json(json!({ "status": "ok", "quota": summary })).into_response()
}

pub async fn admin_providers(State(state): State<GatewayState>) -> Response {
    let snapshot = state.quota.snapshot().await;
    let mut providers = Vec::new();
    for provider in state.config_view.providers() {
        let key: routecodex_common::ProviderKey = provider.id.as_str().into();
        let quota_state = snapshot.get(&key);
        providers.push(json!({
            "id": provider.id,
            "family": provider.family,
            "inPool": quota_state.map(|s| s.in_pool).unwrap_or(true),
            "reason": quota_state.map(|s| format!("{:?}", s.reason)),
            "cooldownUntil": quota_state.and_then(|s| s.cooldown_until),
            "consecutiveErrorCount": quota_state.map(|s| s.consecutive_error_count).unwrap_or(0),
        }));
    }
    Json(json!({ "providers": providers })).into_response()
}

/// Maps the narrow set of errors the gateway itself can raise before even
/// reaching `FailoverExecutor` (currently just routing pre-checks the
/// handlers above don't need, kept here so `router.rs` has a single
/// fallback 404/405 body shape consistent with §6's error envelope).
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": { "type": "NotFound", "code": "NOT_FOUND", "message": "no such route" } }))).into_response()
}
