use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use routecodex_common::RouteKey;

/// The fully-shaped outbound call, stamped by `Provider` and consumed by
/// `ProviderHTTP` (§4.4: "stamps auth, endpoint, and streaming decision on
/// the request; de-stamps on the response"). Lives on the DTO rather than
/// a side channel so the Hub Pipeline stays a single linear chain of
/// `ClientRequest -> ClientRequest` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamTarget {
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    pub connect_timeout_ms: u64,
    pub headers_timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
}

/// Route-level stamping carried alongside the opaque payload (§3 ClientRequest
/// envelope). Set by `VirtualRouter` before a `HubPipeline` run, read by
/// `Provider`/`ProviderHTTP` to know where and as whom to call upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStamp {
    pub provider_id: String,
    pub model_id: String,
    pub request_id: String,
    pub timestamp_ms: i64,
}

/// Request-shape metadata that never changes across a `HubPipeline` run
/// (§3). `excluded_providers` grows across `FailoverExecutor` attempts but
/// is read-only inside a single pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub endpoint: String,
    pub entry_protocol: String,
    pub stream: bool,
    pub excluded_providers: HashSet<String>,
    pub route_key: RouteKey,
}

/// Per-request debug toggles. `stages` accumulates one entry per module
/// slot when `enabled`, so an operator can see the DTO shape at each hop
/// without instrumenting every module by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugState {
    pub enabled: bool,
    #[serde(default)]
    pub stages: BTreeMap<String, Value>,
}

/// The internal DTO handed through the Hub Pipeline (§3 ClientRequest
/// envelope). `data` is opaque to every routing component; only
/// `LLMSwitch`/`Compatibility` modules interpret its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    pub data: Value,
    pub route: RouteStamp,
    pub metadata: RequestMetadata,
    pub debug: DebugState,
    /// Set by `Provider::process_incoming`, cleared by
    /// `Provider::process_outgoing`. `None` at any other stage is a bug,
    /// not a recoverable condition (`ProviderHTTP` raises `ConfigError` if
    /// it ever sees one).
    #[serde(default)]
    pub upstream_target: Option<UpstreamTarget>,
}

impl ClientRequest {
    pub fn record_stage(&mut self, slot: &str, snapshot: Value) {
        if self.debug.enabled {
            self.debug.stages.insert(slot.to_string(), snapshot);
        }
    }
}
