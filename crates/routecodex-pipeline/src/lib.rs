//! The Hub Pipeline: `PipelineModule` (C4), its four built-in instances,
//! and `HubPipeline` (C5), the linear composition that runs them for one
//! (protocol, provider, model, credential) tuple.
//!
//! Knows nothing about routing, quota, or HTTP framing. `routecodex-router`
//! picks the target this crate executes against, and `routecodex-gateway`
//! is the only caller that ever sees an axum request/response.

mod builder;
mod dto;
mod errors;
mod hub;
mod module;
pub mod modules;

pub use builder::build_pipeline;
pub use dto::{ClientRequest, DebugState, RequestMetadata, RouteStamp, UpstreamTarget};
pub use errors::{ModuleError, PipelineError};
pub use hub::{HubPipeline, PipelineOutcome};
pub use module::{
    ByteStream, HttpMethod, ModuleContext, PipelineModule, StageOutcome, UpstreamHttpClient,
    UpstreamHttpRequest, UpstreamHttpResponse,
};
