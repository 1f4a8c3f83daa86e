use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four Hub Pipeline stage slots, in execution order (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleSlot {
    LlmSwitch,
    Compatibility,
    Provider,
    ProviderHttp,
}

pub const SLOT_ORDER: [ModuleSlot; 4] = [
    ModuleSlot::LlmSwitch,
    ModuleSlot::Compatibility,
    ModuleSlot::Provider,
    ModuleSlot::ProviderHttp,
];

/// A configured module instance for one slot of one template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub slot: ModuleSlot,
    pub module_id: String,
    #[serde(default)]
    pub config: Value,
}

/// Ordered list of four module slots, parameterized by
/// (provider family, client protocol) (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTemplate {
    pub provider_family: String,
    pub client_protocol: String,
    pub modules: Vec<ModuleConfig>,
    /// When `true`, a streaming upstream response is fully assembled
    /// before `LLMSwitch`/`Compatibility` outgoing transforms run; when
    /// `false` (the default), the stream is handed to the gateway verbatim
    /// and outgoing transforms apply as a per-event filter (§4.5).
    #[serde(default)]
    pub stream_buffered: bool,
}

impl PipelineTemplate {
    pub fn module_for(&self, slot: ModuleSlot) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.slot == slot)
    }
}
