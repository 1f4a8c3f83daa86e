use std::collections::HashSet;
use std::sync::Arc;

use routecodex_common::{ProviderKey, RouteKey};
use routecodex_provider_core::{ConfigView, PipelineTemplate, RouteMode, RoutePool, RouteTarget};
use routecodex_quota::{Eligibility, ProviderQuotaCenter};
use thiserror::Error;
use tokio::sync::Mutex;

use std::collections::HashMap;

/// `pick(routeKey, excluded) -> { providerKey, modelId, pipelineTemplate,
/// poolId } | fails with NoEligibleProvider` (§4.6).
#[derive(Debug, Clone)]
pub struct RouteTargetPick {
    pub provider_key: ProviderKey,
    pub provider_id: String,
    pub model_id: String,
    pub pipeline_template: PipelineTemplate,
    pub pool_id: String,
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no eligible provider for route key {0:?}")]
    NoEligibleProvider(RouteKey),
}

/// C6: picks a pipeline target for a semantic route key, honoring C3
/// health and the caller's exclusion set (§4.6). Never mutates quota
/// state; round-robin/weighted cursors are its own private, in-memory
/// bookkeeping (§9: "cursors for round-robin/weighted pools live in
/// VirtualRouter's own Mutex, never module statics").
pub struct VirtualRouter {
    config_view: Arc<ConfigView>,
    quota: ProviderQuotaCenter,
    cursors: Mutex<HashMap<String, u64>>,
}

impl VirtualRouter {
    pub fn new(config_view: Arc<ConfigView>, quota: ProviderQuotaCenter) -> Self {
        Self {
            config_view,
            quota,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// `client_protocol` selects which `PipelineTemplate` is attached to
    /// the winning target (§3 PipelineTemplate: "parameterized by
    /// (provider family, client protocol)").
    pub async fn pick(
        &self,
        route_key: &RouteKey,
        excluded: &HashSet<String>,
        client_protocol: &str,
        now_ms: i64,
    ) -> Result<RouteTargetPick, RouterError> {
        let pools = self.config_view.pool(route_key);

        for pool in &pools {
            if let Some(pick) = self
                .pick_from_pool(pool, excluded, client_protocol, now_ms)
                .await
            {
                return Ok(pick);
            }
        }

        Err(RouterError::NoEligibleProvider(route_key.clone()))
    }

    async fn pick_from_pool(
        &self,
        pool: &RoutePool,
        excluded: &HashSet<String>,
        client_protocol: &str,
        now_ms: i64,
    ) -> Option<RouteTargetPick> {
        let mut eligible: Vec<(usize, &RouteTarget)> = Vec::new();
        for (index, target) in pool.targets.iter().enumerate() {
            if excluded.contains(&target.provider_id) {
                continue;
            }
            let provider_key: ProviderKey = target.provider_id.as_str().into();
            if matches!(self.quota.eligible(&provider_key, now_ms).await, Eligibility::Ok) {
                eligible.push((index, target));
            }
        }
        if eligible.is_empty() {
            return None;
        }

        let chosen = match pool.mode {
            RouteMode::Priority => eligible[0].1,
            RouteMode::RoundRobin => {
                let cursor = self.advance_cursor(&pool.pool_id, eligible.len() as u64).await;
                eligible[(cursor % eligible.len() as u64) as usize].1
            }
            RouteMode::Weighted => {
                let expanded: Vec<&RouteTarget> = eligible
                    .iter()
                    .flat_map(|(index, target)| std::iter::repeat_n(*target, pool.weight_of(*index).max(1) as usize))
                    .collect();
                let cursor = self.advance_cursor(&pool.pool_id, expanded.len() as u64).await;
                expanded[(cursor % expanded.len() as u64) as usize]
            }
        };

        let provider = self.config_view.provider(&chosen.provider_id)?;
        let template = self.config_view.template(&provider.family, client_protocol)?;

        Some(RouteTargetPick {
            provider_key: chosen.provider_id.as_str().into(),
            provider_id: chosen.provider_id.clone(),
            model_id: chosen.model_id.clone(),
            pipeline_template: template,
            pool_id: pool.pool_id.clone(),
        })
    }

    /// Returns the cursor value to use for this selection, then advances
    /// it modulo `len` so it never grows unbounded across a long-running
    /// process.
    async fn advance_cursor(&self, pool_id: &str, len: u64) -> u64 {
        let mut guard = self.cursors.lock().await;
        let entry = guard.entry(pool_id.to_string()).or_insert(0);
        let current = *entry;
        *entry = (*entry + 1) % len.max(1);
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routecodex_provider_core::{AuthDescriptor, ConfigSnapshot, ModelEntry, Provider};
    use routecodex_quota::ErrorEvent;
    use std::time::Duration;

    fn provider(id: &str) -> Provider {
        let mut models = HashMap::new();
        models.insert(
            "m1".to_string(),
            ModelEntry {
                model_id: "m1".to_string(),
                max_context: None,
                supports_tools: true,
                supports_vision: false,
                supports_streaming: true,
            },
        );
        Provider {
            id: id.to_string(),
            family: "openai-compat".to_string(),
            base_url: "https://example.invalid".to_string(),
            default_timeout: Duration::from_secs(30),
            supports_streaming: true,
            compatibility_profile: "default".to_string(),
            auth: AuthDescriptor::InlineApiKey {
                header: "Authorization".to_string(),
                prefix: "Bearer ".to_string(),
                value: "k".to_string(),
            },
            models,
        }
    }

    fn template() -> PipelineTemplate {
        PipelineTemplate {
            provider_family: "openai-compat".to_string(),
            client_protocol: "openai-chat".to_string(),
            modules: vec![],
            stream_buffered: false,
        }
    }

    fn snapshot_with_pool(pool: RoutePool) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        for target in &pool.targets {
            snapshot.providers.insert(target.provider_id.clone(), provider(&target.provider_id));
        }
        snapshot
            .templates
            .insert(("openai-compat".to_string(), "openai-chat".to_string()), template());
        snapshot.route_table.insert("default".to_string(), vec![pool]);
        snapshot
    }

    fn target(id: &str) -> RouteTarget {
        RouteTarget {
            provider_id: id.to_string(),
            model_id: "m1".to_string(),
        }
    }

    #[tokio::test]
    async fn s2_priority_pool_skips_excluded_and_ineligible() {
        let pool = RoutePool {
            pool_id: "p".to_string(),
            mode: RouteMode::Priority,
            targets: vec![target("A"), target("B")],
            weights: vec![],
        };
        let view = Arc::new(ConfigView::new(snapshot_with_pool(pool)));
        let quota = ProviderQuotaCenter::spawn(8);
        quota
            .emit_error(ErrorEvent {
                provider_key: "A".into(),
                http_status: Some(429),
                code: None,
                message: None,
                fatal: None,
                now_ms: 0,
            })
            .await;

        let router = VirtualRouter::new(view, quota);
        let picked = router
            .pick(&RouteKey::Default, &HashSet::new(), "openai-chat", 0)
            .await
            .unwrap();
        assert_eq!(picked.provider_id, "B");
    }

    #[tokio::test]
    async fn p6_excluded_provider_is_never_reconsidered() {
        let pool = RoutePool {
            pool_id: "p".to_string(),
            mode: RouteMode::Priority,
            targets: vec![target("A")],
            weights: vec![],
        };
        let view = Arc::new(ConfigView::new(snapshot_with_pool(pool)));
        let quota = ProviderQuotaCenter::spawn(8);
        let router = VirtualRouter::new(view, quota);

        let mut excluded = HashSet::new();
        excluded.insert("A".to_string());
        let err = router
            .pick(&RouteKey::Default, &excluded, "openai-chat", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoEligibleProvider(_)));
    }

    #[tokio::test]
    async fn round_robin_alternates_across_calls() {
        let pool = RoutePool {
            pool_id: "p".to_string(),
            mode: RouteMode::RoundRobin,
            targets: vec![target("A"), target("B")],
            weights: vec![],
        };
        let view = Arc::new(ConfigView::new(snapshot_with_pool(pool)));
        let quota = ProviderQuotaCenter::spawn(8);
        let router = VirtualRouter::new(view, quota);

        let first = router.pick(&RouteKey::Default, &HashSet::new(), "openai-chat", 0).await.unwrap();
        let second = router.pick(&RouteKey::Default, &HashSet::new(), "openai-chat", 0).await.unwrap();
        assert_ne!(first.provider_id, second.provider_id);
    }
}
