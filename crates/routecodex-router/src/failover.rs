use std::collections::HashSet;
use std::sync::Arc;

use routecodex_common::{ErrorSeries, RouteCodexError, RouteKey, now_ms};
use routecodex_pipeline::{ClientRequest, ModuleContext, PipelineError, PipelineOutcome, build_pipeline};
use routecodex_quota::{Eligibility, ErrorEvent, ProviderQuotaCenter, SuccessEvent, UsageEvent};
use tracing::{info, warn};

use crate::virtual_router::VirtualRouter;

/// Why `FailoverExecutor::run` gave up (§4.7).
#[derive(Debug)]
pub enum FailoverError {
    /// Every attempt within `max_attempts` failed with a retryable error, or
    /// no eligible provider remained. Carries the last observed failure.
    Exhausted(Option<RouteCodexError>),
    /// An `EFATAL` error whose cause is credential/config scoped; switching
    /// provider would not help, so no further attempts are made.
    Fatal(RouteCodexError),
}

/// C7: orchestrates bounded retries across providers for one inbound
/// request, feeding every outcome back to C3 (§4.7). One instance per
/// inbound request; never holds a lock across `HubPipeline::execute`.
pub struct FailoverExecutor {
    router: Arc<VirtualRouter>,
    quota: ProviderQuotaCenter,
    max_attempts: usize,
}

impl FailoverExecutor {
    pub fn new(router: Arc<VirtualRouter>, quota: ProviderQuotaCenter, max_attempts: usize) -> Self {
        Self {
            router,
            quota,
            max_attempts: max_attempts.max(1),
        }
    }

    /// `run(inboundDto, routeKey) -> outboundDto | FailoverExhausted | Fatal`
    /// (§4.7). `ctx` is shared across attempts; each attempt builds its own
    /// `HubPipeline` from the target's fresh `PipelineTemplate`.
    pub async fn run(
        &self,
        inbound: ClientRequest,
        route_key: &RouteKey,
        ctx: &ModuleContext,
    ) -> Result<PipelineOutcome, FailoverError> {
        let mut excluded: HashSet<String> = inbound.metadata.excluded_providers.clone();
        let mut last_error: Option<RouteCodexError> = None;

        for attempt in 1..=self.max_attempts {
            let now = now_ms();
            let target = match self.router.pick(route_key, &excluded, &inbound.metadata.entry_protocol, now).await {
                Ok(target) => target,
                Err(_) => return Err(FailoverError::Exhausted(last_error)),
            };

            self.quota
                .emit_usage(UsageEvent {
                    provider_key: target.provider_key.clone(),
                    requested_tokens: None,
                    now_ms: now,
                })
                .await;

            let mut attempt_dto = inbound.clone();
            attempt_dto.route.provider_id = target.provider_id.clone();
            attempt_dto.route.model_id = target.model_id.clone();
            attempt_dto.route.timestamp_ms = now;
            attempt_dto.metadata.excluded_providers = excluded.clone();

            let pipeline = match build_pipeline(&target.pipeline_template) {
                Ok(pipeline) => pipeline,
                Err(err) => return Err(FailoverError::Fatal(err)),
            };
            if let Err(err) = pipeline.initialize(ctx).await {
                return Err(FailoverError::Fatal(err));
            }

            match pipeline.execute(attempt_dto).await {
                Ok(outcome) => {
                    let used_tokens = usage_tokens(&outcome);
                    self.quota
                        .emit_success(SuccessEvent {
                            provider_key: target.provider_key.clone(),
                            used_tokens,
                            now_ms: now_ms(),
                        })
                        .await;
                    info!(attempt, provider = %target.provider_key, "failover attempt succeeded");
                    return Ok(outcome);
                }
                Err(pipeline_error) => {
                    let PipelineError { error, .. } = pipeline_error;
                    warn!(attempt, provider = %target.provider_key, series = error.series.as_str(), "failover attempt failed");

                    self.quota
                        .emit_error(ErrorEvent {
                            provider_key: target.provider_key.clone(),
                            http_status: error.http_status,
                            code: Some(error.code.clone()),
                            message: Some(error.message.clone()),
                            fatal: Some(error.fatal),
                            now_ms: now_ms(),
                        })
                        .await;

                    if is_credential_scoped_fatal(&error) {
                        return Err(FailoverError::Fatal(error));
                    }

                    excluded.insert(target.provider_id.clone());
                    last_error = Some(self.attach_retry_after(error, &target.provider_key).await);
                }
            }
        }

        Err(FailoverError::Exhausted(last_error))
    }

    /// Stamps the minimum `cooldownUntil`-derived `retryAfterMs` onto an
    /// `E429` error so C8 can set the `Retry-After` header (§6, §7). A no-op
    /// for every other series, and for a provider C3 doesn't consider
    /// cooled down (e.g. a transient classification race).
    async fn attach_retry_after(&self, error: RouteCodexError, provider_key: &routecodex_common::ProviderKey) -> RouteCodexError {
        if error.series != ErrorSeries::E429 {
            return error;
        }
        match self.quota.eligible(provider_key, now_ms()).await {
            Eligibility::NotOk {
                retry_after_ms: Some(ms),
                ..
            } => error.with_detail("retryAfterMs", ms.to_string()),
            _ => error,
        }
    }
}

/// Distinguishes the two `EFATAL` cases in §4.7: credential/config scoped
/// errors end the attempt loop immediately, origin-scoped ones (e.g. an
/// endpoint misroute) are retried against another provider like any other
/// series. The codes a built-in module raises for each case are listed in
/// `routecodex-pipeline`'s module implementations.
fn is_credential_scoped_fatal(error: &RouteCodexError) -> bool {
    error.series == ErrorSeries::Efatal
        && matches!(error.code.as_str(), "AUTH" | "MISSING_CREDENTIAL" | "SCHEMA_REJECTED")
}

fn usage_tokens(outcome: &PipelineOutcome) -> Option<u64> {
    match outcome {
        PipelineOutcome::Buffered(dto) => dto
            .data
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|value| value.as_u64()),
        PipelineOutcome::Streaming { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use routecodex_common::ProviderKey;
    use routecodex_pipeline::{UpstreamHttpClient, UpstreamHttpRequest, UpstreamHttpResponse};
    use routecodex_provider_core::{
        AuthDescriptor, ConfigSnapshot, ConfigView, CredentialStore, ModelEntry, ModuleConfig, ModuleSlot,
        PipelineTemplate, Provider, RouteMode, RoutePool, RouteTarget,
    };
    use routecodex_pipeline::{DebugState, RequestMetadata, RouteStamp};
    use serde_json::json;
    use std::time::Duration;

    struct AlwaysFails;

    #[async_trait]
    impl UpstreamHttpClient for AlwaysFails {
        async fn send(&self, _request: UpstreamHttpRequest) -> Result<UpstreamHttpResponse, RouteCodexError> {
            Err(RouteCodexError::new(ErrorSeries::E5xx, "UPSTREAM_5XX", "boom").with_http_status(502))
        }
    }

    fn provider(id: &str) -> Provider {
        let mut models = std::collections::HashMap::new();
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
            modules: vec![
                ModuleConfig {
                    slot: ModuleSlot::LlmSwitch,
                    module_id: "passthrough".to_string(),
                    config: json!({}),
                },
                ModuleConfig {
                    slot: ModuleSlot::Compatibility,
                    module_id: "shape-filter".to_string(),
                    config: json!({}),
                },
                ModuleConfig {
                    slot: ModuleSlot::Provider,
                    module_id: "header-stamping".to_string(),
                    config: json!({ "path": "/chat" }),
                },
                ModuleConfig {
                    slot: ModuleSlot::ProviderHttp,
                    module_id: "http".to_string(),
                    config: json!({}),
                },
            ],
            stream_buffered: false,
        }
    }

    fn dto() -> ClientRequest {
        ClientRequest {
            data: json!({ "model": "m1" }),
            route: RouteStamp {
                provider_id: String::new(),
                model_id: String::new(),
                request_id: "req-1".to_string(),
                timestamp_ms: 0,
            },
            metadata: RequestMetadata {
                endpoint: "/v1/chat/completions".to_string(),
                entry_protocol: "openai-chat".to_string(),
                stream: false,
                excluded_providers: HashSet::new(),
                route_key: RouteKey::Default,
            },
            debug: DebugState::default(),
            upstream_target: None,
        }
    }

    #[tokio::test]
    async fn p2_failover_retries_across_providers_then_exhausts() {
        let pool = RoutePool {
            pool_id: "p".to_string(),
            mode: RouteMode::Priority,
            targets: vec![
                RouteTarget { provider_id: "A".to_string(), model_id: "m1".to_string() },
                RouteTarget { provider_id: "B".to_string(), model_id: "m1".to_string() },
            ],
            weights: vec![],
        };
        let mut snapshot = ConfigSnapshot::default();
        snapshot.providers.insert("A".to_string(), provider("A"));
        snapshot.providers.insert("B".to_string(), provider("B"));
        snapshot
            .templates
            .insert(("openai-compat".to_string(), "openai-chat".to_string()), template());
        snapshot.route_table.insert("default".to_string(), vec![pool]);

        let view = Arc::new(ConfigView::new(snapshot));
        let quota = ProviderQuotaCenter::spawn(8);
        let router = Arc::new(VirtualRouter::new(view.clone(), quota.clone()));
        let executor = FailoverExecutor::new(router, quota.clone(), 2);

        let ctx = ModuleContext {
            config_view: view,
            credential_store: Arc::new(CredentialStore::new()),
            http_client: Arc::new(AlwaysFails),
        };

        let err = executor.run(dto(), &RouteKey::Default, &ctx).await.unwrap_err();
        assert!(matches!(err, FailoverError::Exhausted(Some(_))));

        let snapshot = quota.snapshot().await;
        assert!(!snapshot[&ProviderKey::new("A", None)].in_pool);
    }
}
