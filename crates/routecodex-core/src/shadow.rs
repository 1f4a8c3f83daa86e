use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use routecodex_common::RouteKey;
use routecodex_gateway::ShadowSink;
use routecodex_pipeline::{ClientRequest, ModuleContext, PipelineOutcome};
use routecodex_router::FailoverExecutor;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// One shadow-run observation: what the primary attempt returned vs. what
/// a second, discarded attempt against the same route key returned (§9
/// design notes: "shadow-run fan-out is modeled as an optional second
/// HubPipeline invocation on a bounded JoinSet whose diffs land in a
/// fixed-capacity ring buffer").
#[derive(Debug, Clone)]
pub struct ShadowDiff {
    pub request_id: String,
    pub primary_ok: bool,
    pub shadow_ok: bool,
    pub bodies_equal: bool,
}

/// Runs a second `FailoverExecutor` attempt alongside the primary one,
/// purely for observation; never affects what the client receives. Bounded
/// on two axes: at most `max_in_flight` shadow runs at once (a `JoinSet`
/// caps concurrency), and at most `capacity` retained diffs (a capped
/// `VecDeque`). Every shared field is its own `Arc`/lock rather than the
/// struct being wrapped in one, so the `ShadowSink` trait (which the
/// gateway calls through `&self`, not `Arc<Self>`) can still spawn a
/// detached task that outlives the call.
pub struct ShadowRunner {
    executor: Arc<FailoverExecutor>,
    diffs: Arc<Mutex<VecDeque<ShadowDiff>>>,
    capacity: usize,
    in_flight: Arc<Mutex<JoinSet<()>>>,
    max_in_flight: usize,
}

impl ShadowRunner {
    pub fn new(executor: Arc<FailoverExecutor>, capacity: usize, max_in_flight: usize) -> Self {
        Self {
            executor,
            diffs: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            in_flight: Arc::new(Mutex::new(JoinSet::new())),
            max_in_flight: max_in_flight.max(1),
        }
    }

    async fn record(diffs: &Mutex<VecDeque<ShadowDiff>>, capacity: usize, diff: ShadowDiff) {
        let mut guard = diffs.lock().await;
        if guard.len() >= capacity {
            guard.pop_front();
        }
        guard.push_back(diff);
    }

    pub async fn recent_diffs(&self) -> Vec<ShadowDiff> {
        self.diffs.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl ShadowSink for ShadowRunner {
    /// Fires a shadow attempt for `inbound` unless `max_in_flight` shadow
    /// runs are already outstanding, in which case this request is simply
    /// not shadowed (dropping it is never observable to the client).
    async fn maybe_run(
        &self,
        inbound: ClientRequest,
        route_key: RouteKey,
        ctx: ModuleContext,
        primary_ok: bool,
        primary_body: Option<serde_json::Value>,
    ) {
        let mut in_flight = self.in_flight.lock().await;
        while in_flight.try_join_next().is_some() {}
        if in_flight.len() >= self.max_in_flight {
            return;
        }

        let executor = self.executor.clone();
        let diffs = self.diffs.clone();
        let capacity = self.capacity;
        let request_id = inbound.route.request_id.clone();
        in_flight.spawn(async move {
            let shadow_outcome = executor.run(inbound, &route_key, &ctx).await;
            let (shadow_ok, shadow_body) = match shadow_outcome {
                Ok(PipelineOutcome::Buffered(dto)) => (true, Some(dto.data)),
                Ok(PipelineOutcome::Streaming { .. }) => (true, None),
                Err(_) => (false, None),
            };
            let bodies_equal = match (&primary_body, &shadow_body) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            ShadowRunner::record(
                &diffs,
                capacity,
                ShadowDiff {
                    request_id,
                    primary_ok,
                    shadow_ok,
                    bodies_equal,
                },
            )
            .await;
        });
    }
}
