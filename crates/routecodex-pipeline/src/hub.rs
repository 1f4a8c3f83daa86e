use std::sync::Arc;

use routecodex_common::{ErrorSeries, RouteCodexError};
use routecodex_provider_core::ModuleSlot;

use crate::dto::ClientRequest;
use crate::errors::{ModuleError, PipelineError};
use crate::module::{ByteStream, ModuleContext, PipelineModule, StageOutcome};

/// What a full `HubPipeline::execute` run produced (§4.5). `Streaming`
/// bypasses outgoing transforms beyond `LLMSwitch::decorate_stream` unless
/// the template is configured `stream_buffered`.
pub enum PipelineOutcome {
    Buffered(ClientRequest),
    Streaming { head: ClientRequest, body: ByteStream },
}

/// C5: a linear composition of the four Hub Pipeline modules for one
/// (protocol, provider, model, credential) tuple (§4.5). Built fresh per
/// attempt by `FailoverExecutor` from the target's `PipelineTemplate`.
pub struct HubPipeline {
    llm_switch: Arc<dyn PipelineModule>,
    compatibility: Arc<dyn PipelineModule>,
    provider: Arc<dyn PipelineModule>,
    provider_http: Arc<dyn PipelineModule>,
    stream_buffered: bool,
}

impl HubPipeline {
    pub fn new(
        llm_switch: Arc<dyn PipelineModule>,
        compatibility: Arc<dyn PipelineModule>,
        provider: Arc<dyn PipelineModule>,
        provider_http: Arc<dyn PipelineModule>,
        stream_buffered: bool,
    ) -> Self {
        Self {
            llm_switch,
            compatibility,
            provider,
            provider_http,
            stream_buffered,
        }
    }

    pub async fn initialize(&self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.llm_switch.initialize(ctx).await?;
        self.compatibility.initialize(ctx).await?;
        self.provider.initialize(ctx).await?;
        self.provider_http.initialize(ctx).await?;
        Ok(())
    }

    pub async fn cleanup(&self) -> Result<(), ModuleError> {
        self.llm_switch.cleanup().await?;
        self.compatibility.cleanup().await?;
        self.provider.cleanup().await?;
        self.provider_http.cleanup().await?;
        Ok(())
    }

    /// `execute(inboundDto) -> outboundDto | fails with ProviderError`
    /// (§4.5). Chains `incoming` through the four slots, then `outgoing`
    /// in reverse; on error the partially-processed DTO and the failing
    /// slot are attached so `FailoverExecutor` can classify without
    /// re-deriving context.
    pub async fn execute(&self, inbound: ClientRequest) -> Result<PipelineOutcome, PipelineError> {
        let original = inbound.clone();
        let after_llm_switch = forward_or_err(
            self.llm_switch.process_incoming(inbound).await,
            ModuleSlot::LlmSwitch,
            &original,
        )?;

        let original = after_llm_switch.clone();
        let after_compat = forward_or_err(
            self.compatibility.process_incoming(after_llm_switch).await,
            ModuleSlot::Compatibility,
            &original,
        )?;

        let original = after_compat.clone();
        let after_provider = forward_or_err(
            self.provider.process_incoming(after_compat).await,
            ModuleSlot::Provider,
            &original,
        )?;

        let original = after_provider.clone();
        let outcome = self
            .provider_http
            .process_incoming(after_provider)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::ProviderHttp, err, original))?;

        match outcome {
            StageOutcome::Forward(dto) => {
                // ProviderHTTP never forwards without calling upstream; treat
                // this as a configuration bug in a custom module, not a
                // retryable upstream failure.
                Err(PipelineError::new(
                    ModuleSlot::ProviderHttp,
                    RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", "providerHttp module did not call upstream"),
                    dto,
                ))
            }
            StageOutcome::UpstreamBuffered(dto) => self.run_outgoing_chain(dto).await.map(PipelineOutcome::Buffered),
            StageOutcome::UpstreamStream(head, body) => {
                if self.stream_buffered {
                    let assembled = assemble_stream(head, body).await?;
                    self.run_outgoing_chain(assembled).await.map(PipelineOutcome::Buffered)
                } else {
                    let head = self.strip_upstream_target(head).await?;
                    let body = self.llm_switch.decorate_stream(body);
                    Ok(PipelineOutcome::Streaming { head, body })
                }
            }
        }
    }

    async fn run_outgoing_chain(&self, dto: ClientRequest) -> Result<ClientRequest, PipelineError> {
        let original = dto.clone();
        let dto = self
            .provider_http
            .process_outgoing(dto)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::ProviderHttp, err, original))?;

        let original = dto.clone();
        let dto = self
            .provider
            .process_outgoing(dto)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::Provider, err, original))?;

        let original = dto.clone();
        let dto = self
            .compatibility
            .process_outgoing(dto)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::Compatibility, err, original))?;

        let original = dto.clone();
        self.llm_switch
            .process_outgoing(dto)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::LlmSwitch, err, original))
    }

    /// De-stamps bookkeeping-only fields on the streaming head without
    /// running the full outgoing chain (the chain's transforms apply to
    /// the buffered response shape, which a live byte stream doesn't have).
    async fn strip_upstream_target(&self, dto: ClientRequest) -> Result<ClientRequest, PipelineError> {
        let original = dto.clone();
        self.provider
            .process_outgoing(dto)
            .await
            .map_err(|err| PipelineError::new(ModuleSlot::Provider, err, original))
    }
}

fn forward_or_err(
    result: Result<StageOutcome, ModuleError>,
    slot: ModuleSlot,
    original: &ClientRequest,
) -> Result<ClientRequest, PipelineError> {
    match result {
        Ok(StageOutcome::Forward(dto)) => Ok(dto),
        Ok(_) => Err(PipelineError::new(
            slot,
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", format!("{slot:?} returned an upstream outcome")),
            original.clone(),
        )),
        Err(err) => Err(PipelineError::new(slot, err, original.clone())),
    }
}

/// Minimal stream-buffered assembly: concatenates the byte stream and
/// treats the result as UTF-8 JSON, or a raw string if it isn't valid
/// JSON. Concrete SSE-to-JSON assembly is protocol-specific and out of
/// core scope (§1); this exists so `stream_buffered` templates have a
/// usable default rather than an unimplemented path.
async fn assemble_stream(mut head: ClientRequest, mut body: ByteStream) -> Result<ClientRequest, PipelineError> {
    use tokio_stream::StreamExt;

    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(err) => return Err(PipelineError::new(ModuleSlot::ProviderHttp, err, head)),
        }
    }
    head.data = serde_json::from_slice(&buf)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&buf).into_owned()));
    Ok(head)
}
