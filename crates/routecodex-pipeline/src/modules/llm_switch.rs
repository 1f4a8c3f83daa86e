use async_trait::async_trait;
use serde_json::{Value, json};

use crate::dto::ClientRequest;
use crate::errors::ModuleError;
use crate::module::{ByteStream, ModuleContext, PipelineModule, StageOutcome};

const METADATA_KEY: &str = "_metadata";

/// C4's `LLMSwitch` slot (§4.4 item 1). Stamps/strips a `_metadata`
/// envelope field on an opaque JSON payload, satisfying L1
/// (`outgoing(incoming(x)).data ≅ x.data` modulo the stamped field).
/// Per-protocol wire conversion is out of core scope (§1).
#[derive(Default)]
pub struct PassthroughLlmSwitch;

#[async_trait]
impl PipelineModule for PassthroughLlmSwitch {
    fn slot_name(&self) -> &'static str {
        "llmSwitch"
    }

    async fn initialize(&self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn process_incoming(&self, mut dto: ClientRequest) -> Result<StageOutcome, ModuleError> {
        if let Value::Object(map) = &mut dto.data {
            map.insert(
                METADATA_KEY.to_string(),
                json!({
                    "requestId": dto.route.request_id,
                    "timestamp": dto.route.timestamp_ms,
                }),
            );
        }
        dto.record_stage("llmSwitch.incoming", dto.data.clone());
        Ok(StageOutcome::Forward(dto))
    }

    async fn process_outgoing(&self, mut dto: ClientRequest) -> Result<ClientRequest, ModuleError> {
        if let Value::Object(map) = &mut dto.data {
            map.remove(METADATA_KEY);
        }
        dto.record_stage("llmSwitch.outgoing", dto.data.clone());
        Ok(dto)
    }

    fn decorate_stream(&self, source: ByteStream) -> ByteStream {
        // Raw SSE bytes are forwarded verbatim; the reference points of L1
        // only bind the buffered shape, not the per-event wire bytes.
        source
    }
}
