use std::sync::Arc;
use std::time::Duration;

use routecodex_common::now_ms;
use routecodex_gateway::GatewayState;
use routecodex_pipeline::ModuleContext;
use routecodex_provider_core::{AuthDescriptor, ConfigSnapshot, ConfigView, CredentialStore};
use routecodex_quota::{AuthType, ProviderQuotaCenter, ProviderQuotaState};
use routecodex_router::{FailoverExecutor, VirtualRouter};
use routecodex_storage::{NdjsonErrorLog, SnapshotRunner, SnapshotStore, StorageError};
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::shadow::ShadowRunner;
use crate::upstream_client::ReqwestUpstreamClient;

/// Why [`Runtime::bootstrap`] refused to start, mapped to the exit codes
/// of §6: "3 required credential missing at startup; 10 snapshot
/// corruption refused".
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("provider {provider_id:?} names unknown credential {credential_ref:?}")]
    MissingCredential {
        provider_id: String,
        credential_ref: String,
    },
    #[error("quota snapshot at {0} is corrupt")]
    SnapshotCorrupt(StorageError),
}

impl BootstrapError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCredential { .. } => 3,
            Self::SnapshotCorrupt(_) => 10,
        }
    }
}

/// Owns every long-lived component (C1-C9) and is handed down to the
/// gateway by `Arc` reference, never through an ambient singleton (§9
/// design notes, grounded on the reference proxy's `Core`/`CoreState`
/// split: one assembly point, many cheap handles derived from it).
pub struct Runtime {
    pub config: RuntimeConfig,
    pub config_view: Arc<ConfigView>,
    pub quota: ProviderQuotaCenter,
    pub executor: Arc<FailoverExecutor>,
    pub module_context: ModuleContext,
    pub snapshot_store: Arc<SnapshotStore>,
    pub shadow: Option<Arc<ShadowRunner>>,
}

impl Runtime {
    /// Assembles every component, hydrates C3 from disk if a snapshot
    /// exists, and validates named credentials resolve to a configured
    /// descriptor before the gateway ever accepts a request.
    pub async fn bootstrap(config: RuntimeConfig, snapshot: ConfigSnapshot) -> Result<Self, BootstrapError> {
        for provider in snapshot.providers.values() {
            if let AuthDescriptor::Named(reference) = &provider.auth
                && snapshot.credentials.get(reference).is_none()
            {
                return Err(BootstrapError::MissingCredential {
                    provider_id: provider.id.clone(),
                    credential_ref: reference.clone(),
                });
            }
        }

        let config_view = Arc::new(ConfigView::new(snapshot.clone()));
        let quota = ProviderQuotaCenter::spawn(config.quota_channel_capacity);

        let snapshot_store = Arc::new(SnapshotStore::new(config.snapshot_path()));
        match snapshot_store.load().await {
            Ok(Some(loaded)) => quota.hydrate(loaded.providers, now_ms()).await,
            Ok(None) => {
                for provider in snapshot.providers.values() {
                    quota
                        .register(provider.id.as_str().into(), ProviderQuotaState::fresh(AuthType::Unknown, now_ms()))
                        .await;
                }
            }
            Err(err) => return Err(BootstrapError::SnapshotCorrupt(err)),
        }

        let error_log = Arc::new(NdjsonErrorLog::new(config.error_log_path()));
        quota.error_events().add_sink(error_log).await;

        quota.spawn_ticker(Duration::from_secs(config.tick_interval_secs));
        SnapshotRunner::new(snapshot_store.clone(), quota.clone()).spawn(Duration::from_secs(config.snapshot_interval_secs));

        let router = Arc::new(VirtualRouter::new(config_view.clone(), quota.clone()));
        let executor = Arc::new(FailoverExecutor::new(router, quota.clone(), config.max_attempts));

        let module_context = ModuleContext {
            config_view: config_view.clone(),
            credential_store: Arc::new(CredentialStore::new()),
            http_client: Arc::new(ReqwestUpstreamClient::new()),
        };

        let shadow = if config.shadow_run {
            Some(Arc::new(ShadowRunner::new(executor.clone(), 64, 4)))
        } else {
            None
        };

        Ok(Self {
            config,
            config_view,
            quota,
            executor,
            module_context,
            snapshot_store,
            shadow,
        })
    }

    pub fn gateway_state(&self) -> GatewayState {
        let state = GatewayState::new(
            self.executor.clone(),
            self.module_context.clone(),
            self.config_view.clone(),
            self.quota.clone(),
            false,
        );
        match &self.shadow {
            Some(shadow) => state.with_shadow(shadow.clone()),
            None => state,
        }
    }

    /// Final, synchronous-effect persistence on graceful shutdown (§6, §4.9).
    pub async fn shutdown(&self) {
        let snapshot = self.quota.snapshot().await;
        if let Err(err) = self.snapshot_store.save(&snapshot, now_ms()).await {
            tracing::warn!(error = %err, "failed to persist final quota snapshot on shutdown");
        }
    }
}
