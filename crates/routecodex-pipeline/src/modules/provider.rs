use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use routecodex_common::{ErrorSeries, RouteCodexError};
use routecodex_provider_core::{AuthDescriptor, CredentialDescriptor};
use serde::Deserialize;
use serde_json::Value;

use crate::dto::{ClientRequest, UpstreamTarget};
use crate::errors::ModuleError;
use crate::module::{ModuleContext, PipelineModule, StageOutcome};

/// Module-level configuration for one `HeaderStampingProvider` instance,
/// parsed once from the `ModuleConfig.config` JSON the `PipelineTemplate`
/// carries for the `provider` slot.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderStampingConfig {
    /// Path appended to the provider's `base_url` (e.g.
    /// `/v1/chat/completions`).
    pub path: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_headers_timeout_ms")]
    pub headers_timeout_ms: u64,
    #[serde(default = "default_stream_idle_timeout_ms")]
    pub stream_idle_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_headers_timeout_ms() -> u64 {
    30_000
}
fn default_stream_idle_timeout_ms() -> u64 {
    30_000
}

/// C4's `Provider` slot (§4.4 item 3): stamps auth, endpoint, and the
/// streaming decision onto the request; de-stamps on the response. Never
/// calls the network itself; that's `HttpProviderHttp`'s job.
pub struct HeaderStampingProvider {
    config: HeaderStampingConfig,
    ctx: OnceLock<ModuleContext>,
}

impl HeaderStampingProvider {
    pub fn new(config: Value) -> Result<Self, ModuleError> {
        let config: HeaderStampingConfig = serde_json::from_value(config).map_err(|err| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", format!("bad provider config: {err}"))
        })?;
        Ok(Self {
            config,
            ctx: OnceLock::new(),
        })
    }

    fn ctx(&self) -> Result<&ModuleContext, ModuleError> {
        self.ctx.get().ok_or_else(|| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "provider module not initialized")
        })
    }
}

#[async_trait]
impl PipelineModule for HeaderStampingProvider {
    fn slot_name(&self) -> &'static str {
        "provider"
    }

    async fn initialize(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.ctx
            .set(ctx.clone())
            .map_err(|_| RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "provider module double-initialized"))
    }

    async fn process_incoming(&self, mut dto: ClientRequest) -> Result<StageOutcome, ModuleError> {
        let ctx = self.ctx()?;
        let provider_id = dto.route.provider_id.clone();
        let provider = ctx.config_view.provider(&provider_id).ok_or_else(|| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", format!("unknown provider {provider_id}"))
                .with_detail("providerId", &provider_id)
        })?;

        let descriptor = match &provider.auth {
            AuthDescriptor::Named(reference) => ctx.config_view.credential(reference).ok_or_else(|| {
                RouteCodexError::new(ErrorSeries::Efatal, "AUTH", format!("missing credential {reference}"))
            })?,
            AuthDescriptor::InlineApiKey { header, prefix, value } => CredentialDescriptor::Apikey {
                header: header.clone(),
                prefix: prefix.clone(),
                value: value.clone(),
            },
        };

        let materialized = ctx
            .credential_store
            .resolve(&provider_id, &descriptor)
            .await
            .map_err(|err| {
                RouteCodexError::new(ErrorSeries::Efatal, "AUTH", err.to_string())
                    .with_detail("providerId", &provider_id)
            })?;

        let mut headers = BTreeMap::new();
        headers.insert(materialized.header_name, materialized.header_value);
        headers.insert("content-type".to_string(), "application/json".to_string());

        dto.upstream_target = Some(UpstreamTarget {
            endpoint: format!("{}{}", provider.base_url.trim_end_matches('/'), self.config.path),
            headers,
            connect_timeout_ms: self.config.connect_timeout_ms,
            headers_timeout_ms: self.config.headers_timeout_ms,
            stream_idle_timeout_ms: self.config.stream_idle_timeout_ms,
        });
        dto.record_stage("provider", serde_json::json!({ "scopeTag": materialized.scope_tag }));
        Ok(StageOutcome::Forward(dto))
    }

    async fn process_outgoing(&self, mut dto: ClientRequest) -> Result<ClientRequest, ModuleError> {
        dto.upstream_target = None;
        Ok(dto)
    }
}
