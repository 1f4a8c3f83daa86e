use serde::{Deserialize, Serialize};

/// One candidate in a route pool: `providerId.modelId` (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub provider_id: String,
    pub model_id: String,
}

impl RouteTarget {
    pub fn provider_key_str(&self) -> String {
        self.provider_id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteMode {
    Priority,
    RoundRobin,
    Weighted,
}

/// `{ poolId, mode, targets }` (§3). `weights` is only consulted when
/// `mode == Weighted`; it must have the same length as `targets` when
/// present, otherwise every target is treated as weight 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePool {
    pub pool_id: String,
    pub mode: RouteMode,
    pub targets: Vec<RouteTarget>,
    #[serde(default)]
    pub weights: Vec<u32>,
}

impl RoutePool {
    pub fn weight_of(&self, index: usize) -> u32 {
        self.weights.get(index).copied().unwrap_or(1)
    }
}
