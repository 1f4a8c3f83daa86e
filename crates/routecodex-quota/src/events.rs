use routecodex_common::ProviderKey;
use serde::{Deserialize, Serialize};

/// Emitted by C7 before dispatching an attempt (§4.3).
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub provider_key: ProviderKey,
    pub requested_tokens: Option<u64>,
    pub now_ms: i64,
}

/// Emitted by C7 on a successful attempt (§4.3).
#[derive(Debug, Clone)]
pub struct SuccessEvent {
    pub provider_key: ProviderKey,
    pub used_tokens: Option<u64>,
    pub now_ms: i64,
}

/// Emitted by C7 for every failed attempt, fatal or retryable (§4.3, §4.7).
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub provider_key: ProviderKey,
    pub http_status: Option<u16>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub fatal: Option<bool>,
    pub now_ms: i64,
}

/// Periodic sweep driving window/cooldown/blacklist expiry (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct TickEvent {
    pub now_ms: i64,
}

/// The durable record appended to `provider-errors.ndjson` by C9 for every
/// `ErrorEvent` C3 observes (§6 Persistence).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub provider_key: ProviderKey,
    pub series: routecodex_common::ErrorSeries,
    pub http_status: Option<u16>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub consecutive_error_count: u32,
    pub at_ms: i64,
}
