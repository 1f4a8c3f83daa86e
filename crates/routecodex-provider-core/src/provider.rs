use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A model catalog entry: the flags `VirtualRouter` needs to avoid routing
/// a request to a model that cannot serve it (SPEC_FULL §3 supplement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_id: String,
    pub max_context: Option<u64>,
    #[serde(default)]
    pub supports_tools: bool,
    #[serde(default)]
    pub supports_vision: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
}

fn default_true() -> bool {
    true
}

/// Names the credential a provider authenticates with; the credential's
/// variant must be compatible with the provider's family (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthDescriptor {
    /// Look up a named credential from `ConfigView::credential`.
    Named(String),
    /// An inline API key baked directly into the provider entry.
    InlineApiKey { header: String, prefix: String, value: String },
}

/// Identity of an upstream service (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub family: String,
    pub base_url: String,
    #[serde(with = "duration_millis")]
    pub default_timeout: Duration,
    pub supports_streaming: bool,
    pub compatibility_profile: String,
    pub auth: AuthDescriptor,
    pub models: HashMap<String, ModelEntry>,
}

impl Provider {
    pub fn model(&self, model_id: &str) -> Option<&ModelEntry> {
        self.models.get(model_id)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
