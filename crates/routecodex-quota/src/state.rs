use serde::{Deserialize, Serialize};

use routecodex_common::ErrorSeries;

/// Why a provider is currently out of the eligible pool (§3 ProviderQuotaState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reason {
    Ok,
    Cooldown,
    Blacklist,
    QuotaDepleted,
    Fatal,
    AuthVerify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    Apikey,
    Oauth,
    Unknown,
}

/// One provider key's quota/cooldown state (§3). Owned exclusively by
/// [`crate::center::ProviderQuotaCenter`]; every other component only ever
/// sees a clone taken under its read lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuotaState {
    pub in_pool: bool,
    pub reason: Reason,
    pub auth_type: AuthType,

    pub rate_limit_per_minute: Option<u64>,
    pub token_limit_per_minute: Option<u64>,
    pub total_token_limit: Option<u64>,

    pub window_start_ms: i64,
    pub requests_this_window: u64,
    pub tokens_this_window: u64,
    pub total_tokens_used: u64,

    pub cooldown_until: Option<i64>,
    pub blacklist_until: Option<i64>,

    pub last_error_series: Option<ErrorSeries>,
    pub last_error_code: Option<String>,
    pub last_error_at_ms: Option<i64>,
    pub consecutive_error_count: u32,

    pub priority_tier: i32,
}

impl ProviderQuotaState {
    /// A freshly registered provider: in the pool, no history (§3, §4.1
    /// registration path driven by C1's provider list).
    pub fn fresh(auth_type: AuthType, now_ms: i64) -> Self {
        Self {
            in_pool: true,
            reason: Reason::Ok,
            auth_type,
            rate_limit_per_minute: None,
            token_limit_per_minute: None,
            total_token_limit: None,
            window_start_ms: now_ms,
            requests_this_window: 0,
            tokens_this_window: 0,
            total_tokens_used: 0,
            cooldown_until: None,
            blacklist_until: None,
            last_error_series: None,
            last_error_code: None,
            last_error_at_ms: None,
            consecutive_error_count: 0,
            priority_tier: 0,
        }
    }

    pub fn has_active_cooldown(&self, now_ms: i64) -> bool {
        self.cooldown_until.is_some_and(|until| until > now_ms)
    }

    pub fn has_active_blacklist(&self, now_ms: i64) -> bool {
        self.blacklist_until.is_some_and(|until| until > now_ms)
    }

    /// Max of the two penalty deadlines that are still active, for the
    /// `retryAfterMs` reported by [`crate::center::ProviderQuotaCenter::eligible`].
    pub fn active_penalty_until(&self, now_ms: i64) -> Option<i64> {
        [self.cooldown_until, self.blacklist_until]
            .into_iter()
            .flatten()
            .filter(|until| *until > now_ms)
            .max()
    }
}
