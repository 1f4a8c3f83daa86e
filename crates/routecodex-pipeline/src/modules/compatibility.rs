use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::dto::ClientRequest;
use crate::errors::ModuleError;
use crate::module::{ModuleContext, PipelineModule, StageOutcome};

/// A shape filter: an allow-list of JSON pointer paths to drop plus a
/// rename table, selected by provider profile (§4.4 item 2, GLOSSARY
/// "Compatibility profile").
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShapeFilterConfig {
    #[serde(default)]
    pub drop: Vec<String>,
    #[serde(default)]
    pub rename: Vec<(String, String)>,
}

/// C4's `Compatibility` slot (§4.4 item 2): provider-family-specific
/// request normalization. Must not perform I/O; purely a function of the
/// configured shape filter.
pub struct ShapeFilterCompatibility {
    config: ShapeFilterConfig,
}

impl ShapeFilterCompatibility {
    pub fn new(config: Value) -> Result<Self, ModuleError> {
        let config: ShapeFilterConfig = if config.is_null() {
            ShapeFilterConfig::default()
        } else {
            serde_json::from_value(config).map_err(|err| {
                routecodex_common::RouteCodexError::new(
                    routecodex_common::ErrorSeries::Efatal,
                    "CONFIG",
                    format!("bad compatibility config: {err}"),
                )
            })?
        };
        Ok(Self { config })
    }

    fn apply(&self, value: &mut Value) {
        for pointer in &self.config.drop {
            remove_pointer(value, pointer);
        }
        for (from, to) in &self.config.rename {
            rename_pointer(value, from, to);
        }
    }
}

#[async_trait]
impl PipelineModule for ShapeFilterCompatibility {
    fn slot_name(&self) -> &'static str {
        "compatibility"
    }

    async fn initialize(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn process_incoming(&self, mut dto: ClientRequest) -> Result<StageOutcome, ModuleError> {
        self.apply(&mut dto.data);
        dto.record_stage("compatibility.incoming", dto.data.clone());
        Ok(StageOutcome::Forward(dto))
    }

    async fn process_outgoing(&self, dto: ClientRequest) -> Result<ClientRequest, ModuleError> {
        Ok(dto)
    }
}

fn remove_pointer(value: &mut Value, pointer: &str) {
    let Some((parent_pointer, key)) = pointer.rsplit_once('/') else {
        return;
    };
    let parent = if parent_pointer.is_empty() {
        Some(&mut *value)
    } else {
        value.pointer_mut(parent_pointer)
    };
    if let Some(Value::Object(map)) = parent {
        map.remove(key);
    }
}

fn rename_pointer(value: &mut Value, from: &str, to: &str) {
    let Some((parent_pointer, key)) = from.rsplit_once('/') else {
        return;
    };
    let Some((_, new_key)) = to.rsplit_once('/') else {
        return;
    };
    let parent = if parent_pointer.is_empty() {
        Some(&mut *value)
    } else {
        value.pointer_mut(parent_pointer)
    };
    if let Some(Value::Object(map)) = parent
        && let Some(existing) = map.remove(key)
    {
        map.insert(new_key.to_string(), existing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_nested_field() {
        let filter = ShapeFilterCompatibility {
            config: ShapeFilterConfig {
                drop: vec!["/tool_choice".to_string()],
                rename: vec![],
            },
        };
        let mut value = serde_json::json!({ "tool_choice": "auto", "model": "m" });
        filter.apply(&mut value);
        assert_eq!(value, serde_json::json!({ "model": "m" }));
    }

    #[test]
    fn rename_moves_field_in_place() {
        let filter = ShapeFilterCompatibility {
            config: ShapeFilterConfig {
                drop: vec![],
                rename: vec![("/max_tokens".to_string(), "/max_output_tokens".to_string())],
            },
        };
        let mut value = serde_json::json!({ "max_tokens": 128 });
        filter.apply(&mut value);
        assert_eq!(value, serde_json::json!({ "max_output_tokens": 128 }));
    }
}
