use std::collections::HashSet;

use routecodex_common::{RouteKey, now_ms};
use routecodex_pipeline::{ClientRequest, DebugState, RequestMetadata, RouteStamp};
use serde_json::Value;

use crate::classify::{classify, signals_from_body};

/// One of the three request shapes this gateway accepts at its edge (§8
/// Entry protocols). Recorded on `RequestMetadata::entry_protocol` so a
/// `Compatibility` module can tell which wire shape it is converting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryProtocol {
    OpenAiChat,
    OpenAiResponses,
    AnthropicMessages,
}

impl EntryProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai-chat",
            Self::OpenAiResponses => "openai-responses",
            Self::AnthropicMessages => "anthropic-messages",
        }
    }

    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "/v1/chat/completions",
            Self::OpenAiResponses => "/v1/responses",
            Self::AnthropicMessages => "/v1/messages",
        }
    }
}

/// Builds the internal [`ClientRequest`] envelope and derives its route key
/// in one step, since both need the same raw body/header signals (§4.8,
/// §3 ClientRequest envelope).
pub fn build_client_request(
    entry: EntryProtocol,
    body: Value,
    header_override: Option<&str>,
    debug_enabled: bool,
    request_id: String,
    body_bytes: usize,
) -> (ClientRequest, RouteKey) {
    let signals = signals_from_body(&body, header_override, body_bytes);
    let route_key = classify(&signals);

    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let dto = ClientRequest {
        data: body,
        route: RouteStamp {
            provider_id: String::new(),
            model_id: String::new(),
            request_id,
            timestamp_ms: now_ms(),
        },
        metadata: RequestMetadata {
            endpoint: entry.endpoint_path().to_string(),
            entry_protocol: entry.as_str().to_string(),
            stream,
            excluded_providers: HashSet::new(),
            route_key: route_key.clone(),
        },
        debug: DebugState {
            enabled: debug_enabled,
            stages: Default::default(),
        },
        upstream_target: None,
    };

    (dto, route_key)
}
