use std::collections::HashMap;
use std::path::Path;

use routecodex_provider_core::{ConfigSnapshot, CredentialDescriptor, PipelineTemplate, Provider, RoutePool};
use serde::Deserialize;

/// The on-disk shape of the provider/route/template config file. Parsing
/// and schema validation of this file are explicitly out of the core's
/// scope (§1); this lives in the binary, not in `routecodex-core`, and
/// simply reuses the already-`Deserialize` types `routecodex-provider-core`
/// defines for its `ConfigSnapshot` fields.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    providers: Vec<Provider>,
    #[serde(default)]
    credentials: HashMap<String, CredentialDescriptor>,
    #[serde(default)]
    route_table: HashMap<String, Vec<RoutePool>>,
    #[serde(default)]
    templates: Vec<PipelineTemplate>,
}

/// Loads `path` (if given) into a [`ConfigSnapshot`], or returns an empty
/// snapshot when no path is configured. A `Runtime` with no providers
/// still starts; every route simply reports `RouteUnavailable` until
/// reloaded (reload itself is outside the core's scope, §4.1).
pub fn load_snapshot(path: Option<&Path>) -> anyhow::Result<ConfigSnapshot> {
    let Some(path) = path else {
        return Ok(ConfigSnapshot::default());
    };

    let contents = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("reading config file {}: {err}", path.display()))?;
    let file: FileConfig = serde_json::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("parsing config file {}: {err}", path.display()))?;

    let mut snapshot = ConfigSnapshot::default();
    for provider in file.providers {
        snapshot.providers.insert(provider.id.clone(), provider);
    }
    snapshot.credentials = file.credentials;
    snapshot.route_table = file.route_table;
    for template in file.templates {
        snapshot
            .templates
            .insert((template.provider_family.clone(), template.client_protocol.clone()), template);
    }
    Ok(snapshot)
}
