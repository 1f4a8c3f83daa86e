use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use routecodex_common::RouteCodexError;
use routecodex_provider_core::{ConfigView, CredentialStore};
use tokio_stream::Stream;

use crate::dto::ClientRequest;
use crate::errors::ModuleError;

/// A single chunk of an upstream SSE body, or the classified failure that
/// ended the stream early (§4.4 ProviderHTTP contract: "On network failure
/// it raises one of the enumerated ENET codes").
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RouteCodexError>> + Send>>;

/// Shared, read-only handles every module's `initialize` receives (§9:
/// explicit dependency injection instead of an ambient singleton manager).
#[derive(Clone)]
pub struct ModuleContext {
    pub config_view: Arc<ConfigView>,
    pub credential_store: Arc<CredentialStore>,
    pub http_client: Arc<dyn UpstreamHttpClient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Fully-shaped outbound call, assembled by `HeaderStampingProvider` and
/// executed by `HttpProviderHttp` (§4.4 ProviderHTTP contract: "Input: fully-
/// shaped provider request plus resolved credential headers and endpoint").
#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub want_stream: bool,
    pub connect_timeout_ms: u64,
    pub headers_timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
}

/// What came back over the wire, before `ProviderHTTP::process_outgoing`
/// de-stamps auth/endpoint bookkeeping.
pub enum UpstreamHttpResponse {
    Buffered { status: u16, body: Bytes },
    Streaming { status: u16, body: ByteStream },
}

/// The sole I/O seam of the Hub Pipeline (§4.4). Implemented concretely in
/// `routecodex-core` over a shared `reqwest::Client`; kept as a trait here
/// so `routecodex-pipeline` stays free of a concrete HTTP stack and is
/// trivially mockable in tests.
#[async_trait]
pub trait UpstreamHttpClient: Send + Sync {
    async fn send(&self, request: UpstreamHttpRequest) -> Result<UpstreamHttpResponse, ModuleError>;
}

/// What a module slot produces for one direction of one stage (§4.4). Only
/// `ProviderHTTP::process_incoming` ever returns `UpstreamBuffered` or
/// `UpstreamStream`; every other module, and every `process_outgoing`
/// call, always returns `Forward`.
pub enum StageOutcome {
    Forward(ClientRequest),
    UpstreamBuffered(ClientRequest),
    UpstreamStream(ClientRequest, ByteStream),
}

/// Uniform interface every Hub Pipeline stage implements (§4.4). Modules are
/// pure w.r.t. external state aside from their declared side effects;
/// only `ProviderHTTP` performs I/O.
#[async_trait]
pub trait PipelineModule: Send + Sync {
    fn slot_name(&self) -> &'static str;

    async fn initialize(&self, ctx: &ModuleContext) -> Result<(), ModuleError>;

    async fn process_incoming(&self, dto: ClientRequest) -> Result<StageOutcome, ModuleError>;

    async fn process_outgoing(&self, dto: ClientRequest) -> Result<ClientRequest, ModuleError>;

    async fn cleanup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// A per-event stream filter, supplied only by an `LLMSwitch` module
    /// when the pipeline is not configured as stream-buffered (§4.5:
    /// "the filter is supplied by LLMSwitch as an optional
    /// `decorateStream(source) -> source'`").
    fn decorate_stream(&self, source: ByteStream) -> ByteStream {
        source
    }
}
