use std::sync::Arc;

use async_trait::async_trait;
use routecodex_common::RouteKey;
use routecodex_pipeline::{ClientRequest, ModuleContext};
use routecodex_provider_core::ConfigView;
use routecodex_quota::ProviderQuotaCenter;
use routecodex_router::FailoverExecutor;

/// Fire-and-forget shadow-run hook (§9 design notes). `routecodex-core`'s
/// `ShadowRunner` is the concrete implementation; the gateway only needs
/// the interface so it stays independent of `routecodex-core` (which
/// depends on the gateway, not the other way around).
#[async_trait]
pub trait ShadowSink: Send + Sync {
    async fn maybe_run(
        &self,
        inbound: ClientRequest,
        route_key: RouteKey,
        ctx: ModuleContext,
        primary_ok: bool,
        primary_body: Option<serde_json::Value>,
    );
}

/// Everything an axum handler needs, assembled once at startup by
/// `routecodex-core`'s bootstrap and shared behind `Arc` across every
/// request task (§9: explicit dependency injection, no ambient singleton).
#[derive(Clone)]
pub struct GatewayState {
    pub executor: Arc<FailoverExecutor>,
    pub module_context: ModuleContext,
    pub config_view: Arc<ConfigView>,
    pub quota: ProviderQuotaCenter,
    pub debug_enabled: bool,
    pub shadow: Option<Arc<dyn ShadowSink>>,
}

impl GatewayState {
    pub fn new(
        executor: Arc<FailoverExecutor>,
        module_context: ModuleContext,
        config_view: Arc<ConfigView>,
        quota: ProviderQuotaCenter,
        debug_enabled: bool,
    ) -> Self {
        Self {
            executor,
            module_context,
            config_view,
            quota,
            debug_enabled,
            shadow: None,
        }
    }

    pub fn with_shadow(mut self, shadow: Arc<dyn ShadowSink>) -> Self {
        self.shadow = Some(shadow);
        self
    }
}
