use routecodex_common::ErrorSeries;

use crate::events::ErrorEvent;

/// Same-series errors within this many milliseconds of each other belong to
/// the same error chain and escalate `consecutiveErrorCount` (§4.3).
pub const ERROR_CHAIN_WINDOW_MS: i64 = 10 * 60 * 1000;

const NET_CODES: &[&str] = &[
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "EAI_AGAIN",
    "UPSTREAM_HEADERS_TIMEOUT",
    "UPSTREAM_STREAM_TIMEOUT",
    "UPSTREAM_STREAM_IDLE_TIMEOUT",
    "UPSTREAM_STREAM_ABORTED",
];

/// Pure classification of an [`ErrorEvent`] into a closed error series
/// (§4.3). Order matters: `fatal` always wins, then rate/quota, then HTTP
/// status, then network codes/messages, defaulting to `EOTHER`.
pub fn normalize_error_series(event: &ErrorEvent) -> ErrorSeries {
    let code_upper = event.code.as_deref().unwrap_or_default().to_uppercase();

    if event.fatal == Some(true)
        || ["AUTH", "UNAUTHORIZED", "CONFIG", "FATAL"]
            .iter()
            .any(|needle| code_upper.contains(needle))
    {
        return ErrorSeries::Efatal;
    }

    if event.http_status == Some(429)
        || ["RATE", "QUOTA", "429"]
            .iter()
            .any(|needle| code_upper.contains(needle))
    {
        return ErrorSeries::E429;
    }

    if let Some(status) = event.http_status
        && (500..600).contains(&status)
    {
        return ErrorSeries::E5xx;
    }

    if NET_CODES.contains(&code_upper.as_str()) {
        return ErrorSeries::Enet;
    }

    let message_upper = event.message.as_deref().unwrap_or_default().to_uppercase();
    if ["TIMEOUT", "FETCH FAILED", "SOCKET HANG UP", "TLS HANDSHAKE TIMEOUT"]
        .iter()
        .any(|needle| message_upper.contains(needle))
    {
        return ErrorSeries::Enet;
    }

    ErrorSeries::Eother
}

/// Cooldown step schedule in milliseconds, indexed by
/// `consecutiveErrorCount - 1` and clamped to the last entry; no wrap
/// (§4.3, invariant I2/P3).
pub fn cooldown_schedule(series: ErrorSeries) -> &'static [i64] {
    const RATE_LIKE: [i64; 4] = [3_000, 10_000, 31_000, 61_000];
    const FATAL: [i64; 5] = [300_000, 900_000, 1_800_000, 3_600_000, 10_800_000];

    match series {
        ErrorSeries::Efatal => &FATAL,
        ErrorSeries::E429 | ErrorSeries::E5xx | ErrorSeries::Enet | ErrorSeries::Eother => {
            &RATE_LIKE
        }
    }
}

/// The cooldown step, in milliseconds, for the given series and 1-based
/// consecutive error count.
pub fn cooldown_step_ms(series: ErrorSeries, consecutive_error_count: u32) -> i64 {
    let schedule = cooldown_schedule(series);
    let index = (consecutive_error_count.saturating_sub(1) as usize).min(schedule.len() - 1);
    schedule[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        http_status: Option<u16>,
        code: Option<&str>,
        message: Option<&str>,
        fatal: Option<bool>,
    ) -> ErrorEvent {
        ErrorEvent {
            provider_key: "openai".into(),
            http_status,
            code: code.map(str::to_string),
            message: message.map(str::to_string),
            fatal,
            now_ms: 0,
        }
    }

    #[test]
    fn fatal_flag_wins_over_everything() {
        let e = event(Some(429), Some("RATE_LIMIT"), None, Some(true));
        assert_eq!(normalize_error_series(&e), ErrorSeries::Efatal);
    }

    #[test]
    fn classifies_429_by_status_or_code() {
        assert_eq!(
            normalize_error_series(&event(Some(429), None, None, None)),
            ErrorSeries::E429
        );
        assert_eq!(
            normalize_error_series(&event(None, Some("quota_exceeded"), None, None)),
            ErrorSeries::E429
        );
    }

    #[test]
    fn classifies_5xx_by_status_range() {
        assert_eq!(
            normalize_error_series(&event(Some(503), None, None, None)),
            ErrorSeries::E5xx
        );
        assert_eq!(
            normalize_error_series(&event(Some(600), None, None, None)),
            ErrorSeries::Eother
        );
    }

    #[test]
    fn classifies_network_codes_and_messages() {
        assert_eq!(
            normalize_error_series(&event(None, Some("ECONNRESET"), None, None)),
            ErrorSeries::Enet
        );
        assert_eq!(
            normalize_error_series(&event(None, None, Some("socket hang up"), None)),
            ErrorSeries::Enet
        );
    }

    #[test]
    fn falls_back_to_eother() {
        assert_eq!(
            normalize_error_series(&event(Some(200), Some("weird"), None, None)),
            ErrorSeries::Eother
        );
    }

    #[test]
    fn schedule_clamps_at_last_step_no_wrap() {
        let series = ErrorSeries::E429;
        assert_eq!(cooldown_step_ms(series, 1), 3_000);
        assert_eq!(cooldown_step_ms(series, 4), 61_000);
        assert_eq!(cooldown_step_ms(series, 5), 61_000);
        assert_eq!(cooldown_step_ms(series, 100), 61_000);
    }

    #[test]
    fn fatal_schedule_is_longer() {
        assert_eq!(cooldown_step_ms(ErrorSeries::Efatal, 1), 300_000);
        assert_eq!(cooldown_step_ms(ErrorSeries::Efatal, 5), 10_800_000);
        assert_eq!(cooldown_step_ms(ErrorSeries::Efatal, 9), 10_800_000);
    }
}
