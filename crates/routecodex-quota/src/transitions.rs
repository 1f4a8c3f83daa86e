//! Pure state-transition functions applied, one event at a time, by the
//! single actor task in [`crate::center`] (§4.3). Kept free of channels and
//! locking so they can be unit-tested directly against P1–P4 and the S2–S4
//! scenarios.

use routecodex_common::ErrorSeries;

use crate::classify::{ERROR_CHAIN_WINDOW_MS, cooldown_step_ms, normalize_error_series};
use crate::events::{ErrorEvent, SuccessEvent, TickEvent, UsageEvent};
use crate::state::{ProviderQuotaState, Reason};

const WINDOW_MS: i64 = 60_000;

/// Slides the one-minute window if it has elapsed, resetting the soft
/// per-minute counters. `quotaDepleted` self-heals here unless
/// `totalTokenLimit` is still exceeded (§4.3 UsageEvent semantics).
fn tick_window(state: &mut ProviderQuotaState, now_ms: i64) {
    if now_ms - state.window_start_ms < WINDOW_MS {
        return;
    }
    state.window_start_ms = now_ms;
    state.requests_this_window = 0;
    state.tokens_this_window = 0;

    if state.reason == Reason::QuotaDepleted {
        let total_still_exhausted = state
            .total_token_limit
            .is_some_and(|limit| state.total_tokens_used > limit);
        if !total_still_exhausted {
            state.reason = Reason::Ok;
            state.in_pool = true;
        }
    }
}

pub fn apply_usage_event(state: &mut ProviderQuotaState, event: &UsageEvent) {
    tick_window(state, event.now_ms);

    state.requests_this_window += 1;
    if let Some(tokens) = event.requested_tokens {
        state.tokens_this_window += tokens;
    }

    let exceeded = state
        .rate_limit_per_minute
        .is_some_and(|limit| state.requests_this_window > limit)
        || state
            .token_limit_per_minute
            .is_some_and(|limit| state.tokens_this_window > limit)
        || state
            .total_token_limit
            .is_some_and(|limit| state.total_tokens_used > limit);

    if exceeded {
        state.reason = Reason::QuotaDepleted;
        state.in_pool = false;
    }
}

pub fn apply_success_event(state: &mut ProviderQuotaState, event: &SuccessEvent) {
    state.consecutive_error_count = 0;
    state.last_error_series = None;
    state.last_error_at_ms = None;

    if let Some(used) = event.used_tokens {
        state.total_tokens_used += used;
        state.tokens_this_window += used;
    }

    if state.has_active_blacklist(event.now_ms) {
        return;
    }

    let cooldown_elapsed = !state.has_active_cooldown(event.now_ms);
    if cooldown_elapsed || state.reason == Reason::Cooldown {
        state.reason = Reason::Ok;
        state.in_pool = true;
        state.cooldown_until = None;
    }
}

pub fn apply_error_event(state: &mut ProviderQuotaState, event: &ErrorEvent) {
    let series = normalize_error_series(event);

    let same_chain = state.last_error_series == Some(series)
        && state
            .last_error_at_ms
            .is_some_and(|at| event.now_ms - at <= ERROR_CHAIN_WINDOW_MS);
    state.consecutive_error_count = if same_chain {
        state.consecutive_error_count + 1
    } else {
        1
    };
    state.last_error_series = Some(series);
    state.last_error_code = event.code.clone();
    state.last_error_at_ms = Some(event.now_ms);

    // I3: a live manual blacklist is rigid. Only the error-chain counters
    // above move; reason/inPool/cooldownUntil stay untouched (P4).
    if state.has_active_blacklist(event.now_ms) {
        return;
    }

    let step = cooldown_step_ms(series, state.consecutive_error_count);
    let candidate = event.now_ms + step;
    state.cooldown_until = Some(match state.cooldown_until {
        Some(existing) => existing.max(candidate),
        None => candidate,
    });
    state.reason = Reason::Cooldown;
    state.in_pool = false;
}

/// Periodic sweep: expires blacklist/cooldown, preserves `quotaDepleted`
/// unless hard totals are exhausted, and repairs I1 for snapshots loaded
/// from disk (§4.3 TickEvent semantics).
pub fn apply_tick_event(state: &mut ProviderQuotaState, event: &TickEvent) {
    tick_window(state, event.now_ms);

    if let Some(until) = state.blacklist_until
        && until <= event.now_ms
    {
        state.blacklist_until = None;
        state.consecutive_error_count = 0;
        state.last_error_series = None;
        state.last_error_code = None;
        state.last_error_at_ms = None;
    }

    if let Some(until) = state.cooldown_until
        && until <= event.now_ms
        && state.reason == Reason::Cooldown
    {
        state.cooldown_until = None;
        state.reason = Reason::Ok;
    }

    let active_penalty = state.has_active_blacklist(event.now_ms) || state.has_active_cooldown(event.now_ms);
    if active_penalty {
        state.in_pool = false;
    } else if state.reason == Reason::Ok {
        state.in_pool = true;
    } else if !matches!(state.reason, Reason::QuotaDepleted | Reason::Fatal | Reason::AuthVerify) {
        // Cooldown/Blacklist reasons whose deadline was already cleared
        // above fall through to Ok via the branches earlier in this
        // function; nothing else should still hold a stale reason here.
        state.reason = Reason::Ok;
        state.in_pool = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuthType;

    fn fresh(now: i64) -> ProviderQuotaState {
        ProviderQuotaState::fresh(AuthType::Apikey, now)
    }

    #[test]
    fn p1_quota_window_hard_limit_sets_depleted() {
        let mut state = fresh(0);
        state.rate_limit_per_minute = Some(2);

        apply_usage_event(
            &mut state,
            &UsageEvent {
                provider_key: "openai".into(),
                requested_tokens: None,
                now_ms: 0,
            },
        );
        assert_eq!(state.reason, Reason::Ok);
        assert!(state.in_pool);

        apply_usage_event(
            &mut state,
            &UsageEvent {
                provider_key: "openai".into(),
                requested_tokens: None,
                now_ms: 1,
            },
        );
        apply_usage_event(
            &mut state,
            &UsageEvent {
                provider_key: "openai".into(),
                requested_tokens: None,
                now_ms: 2,
            },
        );
        assert_eq!(state.reason, Reason::QuotaDepleted);
        assert!(!state.in_pool);
    }

    #[test]
    fn p2_and_p3_cooldown_escalates_then_clamps() {
        let mut state = fresh(0);
        let mut now = 0i64;
        let mut prev_until = 0i64;
        let expected = [3_000, 10_000, 31_000, 61_000, 61_000];
        for step in expected {
            apply_error_event(
                &mut state,
                &ErrorEvent {
                    provider_key: "openai".into(),
                    http_status: Some(429),
                    code: None,
                    message: None,
                    fatal: None,
                    now_ms: now,
                },
            );
            let until = state.cooldown_until.unwrap();
            assert_eq!(until, now + step);
            assert!(until >= prev_until);
            prev_until = until;
            now += 1;
        }
    }

    #[test]
    fn p4_manual_blacklist_is_rigid_to_error_events() {
        let mut state = fresh(0);
        state.reason = Reason::Blacklist;
        state.in_pool = false;
        state.blacklist_until = Some(3_600_000);

        apply_error_event(
            &mut state,
            &ErrorEvent {
                provider_key: "openai".into(),
                http_status: Some(429),
                code: None,
                message: None,
                fatal: None,
                now_ms: 0,
            },
        );

        assert_eq!(state.blacklist_until, Some(3_600_000));
        assert_eq!(state.reason, Reason::Blacklist);
        assert!(!state.in_pool);
        assert_eq!(state.consecutive_error_count, 1);
        assert_eq!(state.last_error_series, Some(ErrorSeries::E429));
    }

    #[test]
    fn success_event_clears_error_chain_and_recovers_from_cooldown() {
        let mut state = fresh(0);
        apply_error_event(
            &mut state,
            &ErrorEvent {
                provider_key: "openai".into(),
                http_status: Some(503),
                code: None,
                message: None,
                fatal: None,
                now_ms: 0,
            },
        );
        assert_eq!(state.reason, Reason::Cooldown);

        apply_success_event(
            &mut state,
            &SuccessEvent {
                provider_key: "openai".into(),
                used_tokens: Some(8),
                now_ms: 3_001,
            },
        );
        assert_eq!(state.reason, Reason::Ok);
        assert!(state.in_pool);
        assert_eq!(state.consecutive_error_count, 0);
        assert_eq!(state.total_tokens_used, 8);
    }

    #[test]
    fn tick_expires_cooldown_and_reinstates_pool_membership() {
        let mut state = fresh(0);
        apply_error_event(
            &mut state,
            &ErrorEvent {
                provider_key: "openai".into(),
                http_status: Some(429),
                code: None,
                message: None,
                fatal: None,
                now_ms: 0,
            },
        );
        assert!(!state.in_pool);

        apply_tick_event(&mut state, &TickEvent { now_ms: 3_000 });
        assert_eq!(state.reason, Reason::Ok);
        assert!(state.in_pool);
    }

    #[test]
    fn tick_reconciles_i1_for_loaded_snapshot_with_stale_in_pool() {
        let mut state = fresh(0);
        state.in_pool = true;
        state.reason = Reason::Cooldown;
        state.cooldown_until = Some(10_000);

        apply_tick_event(&mut state, &TickEvent { now_ms: 1 });
        assert!(!state.in_pool);
    }
}
