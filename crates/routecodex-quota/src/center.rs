use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use routecodex_common::ProviderKey;
use routecodex_provider_core::EventHub;

use crate::events::{ErrorEvent, ErrorRecord, SuccessEvent, TickEvent, UsageEvent};
use crate::state::{AuthType, ProviderQuotaState, Reason};
use crate::transitions::{apply_error_event, apply_success_event, apply_tick_event, apply_usage_event};

enum Command {
    Usage(UsageEvent, oneshot::Sender<()>),
    Success(SuccessEvent, oneshot::Sender<()>),
    Error(ErrorEvent, oneshot::Sender<()>),
    Tick(TickEvent, oneshot::Sender<()>),
}

/// Result of [`ProviderQuotaCenter::eligible`] (§4.3 public reader).
#[derive(Debug, Clone)]
pub enum Eligibility {
    Ok,
    NotOk {
        reason: Reason,
        retry_after_ms: Option<i64>,
    },
}

/// Aggregate counts across every tracked provider, consulted by `GET
/// /health` (§4.8: "process health and `C3.summary()`").
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSummary {
    pub total_providers: usize,
    pub in_pool: usize,
    pub cooldown: usize,
    pub blacklist: usize,
    pub quota_depleted: usize,
}

/// C3: the per-provider quota/cooldown state machine, run as a single
/// serialized actor task so every mutation is applied in the order its
/// event was sent (§4.3 Concurrency), grounded on the reference proxy's
/// `UnavailableQueue::spawn_recover_task` background-task shape.
#[derive(Clone)]
pub struct ProviderQuotaCenter {
    states: Arc<RwLock<HashMap<ProviderKey, ProviderQuotaState>>>,
    commands: mpsc::Sender<Command>,
    error_events: EventHub<ErrorRecord>,
}

impl ProviderQuotaCenter {
    /// Spawns the actor task and returns a cheaply cloneable handle. `buffer`
    /// bounds the command channel; callers block briefly under sustained
    /// burst load rather than unbounded memory growth.
    pub fn spawn(buffer: usize) -> Self {
        let states: Arc<RwLock<HashMap<ProviderKey, ProviderQuotaState>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let error_events = EventHub::new(256);
        let (tx, mut rx) = mpsc::channel::<Command>(buffer);

        let actor_states = states.clone();
        let actor_events = error_events.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Usage(event, ack) => {
                        let mut guard = actor_states.write().await;
                        let state = guard
                            .entry(event.provider_key.clone())
                            .or_insert_with(|| ProviderQuotaState::fresh(AuthType::Unknown, event.now_ms));
                        apply_usage_event(state, &event);
                        drop(guard);
                        let _ = ack.send(());
                    }
                    Command::Success(event, ack) => {
                        let mut guard = actor_states.write().await;
                        if let Some(state) = guard.get_mut(&event.provider_key) {
                            apply_success_event(state, &event);
                        }
                        drop(guard);
                        let _ = ack.send(());
                    }
                    Command::Error(event, ack) => {
                        let record = {
                            let mut guard = actor_states.write().await;
                            let state = guard
                                .entry(event.provider_key.clone())
                                .or_insert_with(|| {
                                    ProviderQuotaState::fresh(AuthType::Unknown, event.now_ms)
                                });
                            apply_error_event(state, &event);
                            ErrorRecord {
                                provider_key: event.provider_key.clone(),
                                series: state.last_error_series.expect("just set by apply_error_event"),
                                http_status: event.http_status,
                                code: event.code.clone(),
                                message: event.message.clone(),
                                consecutive_error_count: state.consecutive_error_count,
                                at_ms: event.now_ms,
                            }
                        };
                        actor_events.emit(record).await;
                        let _ = ack.send(());
                    }
                    Command::Tick(event, ack) => {
                        let mut guard = actor_states.write().await;
                        for state in guard.values_mut() {
                            apply_tick_event(state, &event);
                        }
                        drop(guard);
                        let _ = ack.send(());
                    }
                }
            }
        });

        Self {
            states,
            commands: tx,
            error_events,
        }
    }

    async fn send(&self, build: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(build(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub async fn emit_usage(&self, event: UsageEvent) {
        self.send(|ack| Command::Usage(event, ack)).await;
    }

    pub async fn emit_success(&self, event: SuccessEvent) {
        self.send(|ack| Command::Success(event, ack)).await;
    }

    pub async fn emit_error(&self, event: ErrorEvent) {
        self.send(|ack| Command::Error(event, ack)).await;
    }

    pub async fn tick(&self, event: TickEvent) {
        self.send(|ack| Command::Tick(event, ack)).await;
    }

    /// Durable log of every `ErrorEvent` C3 observes, consumed by C9 to
    /// append `provider-errors.ndjson` (§6 Persistence).
    pub fn error_events(&self) -> EventHub<ErrorRecord> {
        self.error_events.clone()
    }

    /// Register a provider explicitly (e.g. from C1's provider list) ahead
    /// of its first event, so limits/priority are in place before the
    /// first `UsageEvent`.
    pub async fn register(&self, provider_key: ProviderKey, state: ProviderQuotaState) {
        self.states.write().await.insert(provider_key, state);
    }

    /// C6's read path: is `provider_key` eligible right now (§4.3 public
    /// reader).
    pub async fn eligible(&self, provider_key: &ProviderKey, now_ms: i64) -> Eligibility {
        let guard = self.states.read().await;
        match guard.get(provider_key) {
            None => Eligibility::Ok,
            Some(state) if state.in_pool => Eligibility::Ok,
            Some(state) => Eligibility::NotOk {
                reason: state.reason,
                retry_after_ms: state
                    .active_penalty_until(now_ms)
                    .map(|until| until - now_ms),
            },
        }
    }

    /// A consistent, copy-on-read snapshot of every tracked provider's
    /// state, for C6's routing decisions and C9's persistence sweep.
    pub async fn snapshot(&self) -> HashMap<ProviderKey, ProviderQuotaState> {
        self.states.read().await.clone()
    }

    /// Aggregate counts for `GET /health` (§4.8).
    pub async fn summary(&self) -> QuotaSummary {
        let guard = self.states.read().await;
        let mut summary = QuotaSummary {
            total_providers: guard.len(),
            ..Default::default()
        };
        for state in guard.values() {
            if state.in_pool {
                summary.in_pool += 1;
            }
            match state.reason {
                Reason::Cooldown => summary.cooldown += 1,
                Reason::Blacklist => summary.blacklist += 1,
                Reason::QuotaDepleted => summary.quota_depleted += 1,
                _ => {}
            }
        }
        summary
    }

    /// Spawns the lightweight timer task that drives the periodic
    /// `TickEvent` sweep (§4.3, SPEC_FULL §4.3: "a second lightweight timer
    /// task emits TickEvents"). A fixed-interval sweep is enough here since
    /// one tick always walks every tracked provider, unlike the reference
    /// proxy's per-deadline `UnavailableQueue` heap.
    pub fn spawn_ticker(&self, interval: std::time::Duration) {
        let center = self.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                center.tick(TickEvent { now_ms: routecodex_common::now_ms() }).await;
            }
        });
    }

    /// Startup hydration: replace the whole map (e.g. from a loaded
    /// snapshot) and immediately repair I1 via a tick (§4.3 Persistence).
    pub async fn hydrate(&self, states: HashMap<ProviderKey, ProviderQuotaState>, now_ms: i64) {
        {
            let mut guard = self.states.write().await;
            *guard = states;
        }
        self.tick(TickEvent { now_ms }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s1_clean_success_updates_totals_only() {
        let center = ProviderQuotaCenter::spawn(16);
        let key: ProviderKey = "openai.K".into();

        center
            .emit_usage(UsageEvent {
                provider_key: key.clone(),
                requested_tokens: Some(8),
                now_ms: 0,
            })
            .await;
        center
            .emit_success(SuccessEvent {
                provider_key: key.clone(),
                used_tokens: Some(8),
                now_ms: 1,
            })
            .await;

        let snapshot = center.snapshot().await;
        let state = &snapshot[&key];
        assert!(state.in_pool);
        assert_eq!(state.reason, Reason::Ok);
        assert_eq!(state.total_tokens_used, 8);
    }

    #[tokio::test]
    async fn s2_429_failover_excludes_a_and_leaves_b_eligible() {
        let center = ProviderQuotaCenter::spawn(16);
        let a: ProviderKey = "A".into();
        let b: ProviderKey = "B".into();

        center
            .emit_error(ErrorEvent {
                provider_key: a.clone(),
                http_status: Some(429),
                code: None,
                message: None,
                fatal: None,
                now_ms: 0,
            })
            .await;
        center
            .emit_success(SuccessEvent {
                provider_key: b.clone(),
                used_tokens: Some(12),
                now_ms: 1,
            })
            .await;

        let snapshot = center.snapshot().await;
        assert_eq!(snapshot[&a].cooldown_until, Some(3_000));
        assert!(!snapshot[&a].in_pool);
        assert_eq!(snapshot[&a].consecutive_error_count, 1);
        assert_eq!(snapshot[&b].total_tokens_used, 12);

        assert!(matches!(center.eligible(&a, 0).await, Eligibility::NotOk { .. }));
        assert!(matches!(center.eligible(&b, 0).await, Eligibility::Ok));
    }

    #[tokio::test]
    async fn hydrate_repairs_i1_on_loaded_snapshot() {
        let center = ProviderQuotaCenter::spawn(16);
        let key: ProviderKey = "openai".into();
        let mut state = ProviderQuotaState::fresh(AuthType::Apikey, 0);
        state.in_pool = true;
        state.reason = Reason::Cooldown;
        state.cooldown_until = Some(50_000);

        let mut loaded = HashMap::new();
        loaded.insert(key.clone(), state);
        center.hydrate(loaded, 1).await;

        let snapshot = center.snapshot().await;
        assert!(!snapshot[&key].in_pool);
    }
}
