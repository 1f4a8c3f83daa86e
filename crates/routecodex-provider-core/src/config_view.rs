use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use routecodex_common::RouteKey;

use crate::credential::CredentialDescriptor;
use crate::pipeline_template::PipelineTemplate;
use crate::provider::Provider;
use crate::route_pool::RoutePool;

/// The data a reload produces; immutable once published (§3 Provider
/// Lifecycle, §4.1 Guarantees).
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub providers: HashMap<String, Provider>,
    pub credentials: HashMap<String, CredentialDescriptor>,
    pub route_table: HashMap<String, Vec<RoutePool>>,
    pub templates: HashMap<(String, String), PipelineTemplate>,
}

/// Read-only projection of loaded config (C1, §4.1). Reload publishes a new
/// `Arc<ConfigSnapshot>` via `ArcSwap`; readers that already hold a clone of
/// the old `Arc` keep it valid for the duration of their in-flight request,
/// exactly as the reference proxy's `AppState::providers` behaves.
pub struct ConfigView {
    snapshot: ArcSwap<ConfigSnapshot>,
    version: std::sync::atomic::AtomicU64,
}

impl Default for ConfigView {
    fn default() -> Self {
        Self::new(ConfigSnapshot::default())
    }
}

impl ConfigView {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            version: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Publish a new snapshot, bumping `version`. In-flight pipelines built
    /// against the previous `Arc` keep running against it (§3).
    pub fn reload(&self, snapshot: ConfigSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
        self.version
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn version(&self) -> u64 {
        self.version.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn load(&self) -> Arc<ConfigSnapshot> {
        self.snapshot.load_full()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.load().providers.values().cloned().collect()
    }

    pub fn provider(&self, id: &str) -> Option<Provider> {
        self.load().providers.get(id).cloned()
    }

    pub fn credential(&self, reference: &str) -> Option<CredentialDescriptor> {
        self.load().credentials.get(reference).cloned()
    }

    /// Resolves the ordered pool list for a route key, falling back to
    /// `default` when the key is unrecognized or has no configured pools
    /// (§3 Route table, §4.6 step 1).
    pub fn pool(&self, route_key: &RouteKey) -> Vec<RoutePool> {
        let snapshot = self.load();
        if let Some(pools) = snapshot.route_table.get(route_key.as_str()) {
            if !pools.is_empty() {
                return pools.clone();
            }
        }
        snapshot
            .route_table
            .get(RouteKey::Default.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn template(&self, provider_family: &str, client_protocol: &str) -> Option<PipelineTemplate> {
        self.load()
            .templates
            .get(&(provider_family.to_string(), client_protocol.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_pool::{RouteMode, RouteTarget};

    fn pool(id: &str) -> RoutePool {
        RoutePool {
            pool_id: id.to_string(),
            mode: RouteMode::Priority,
            targets: vec![RouteTarget {
                provider_id: "openai".into(),
                model_id: "gpt-x".into(),
            }],
            weights: vec![],
        }
    }

    #[test]
    fn unknown_route_key_falls_back_to_default_pool() {
        let mut snapshot = ConfigSnapshot::default();
        snapshot
            .route_table
            .insert("default".to_string(), vec![pool("p-default")]);
        let view = ConfigView::new(snapshot);

        let resolved = view.pool(&RouteKey::parse("made-up"));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].pool_id, "p-default");
    }

    #[test]
    fn reload_bumps_version_and_is_visible_to_new_reads() {
        let view = ConfigView::default();
        let v1 = view.version();
        view.reload(ConfigSnapshot::default());
        assert!(view.version() > v1);
    }
}
