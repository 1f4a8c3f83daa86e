use routecodex_common::RouteCodexError;
use routecodex_provider_core::ModuleSlot;

use crate::dto::ClientRequest;

/// A module's failure, still a plain [`RouteCodexError`] (§9 design notes:
/// "normalize to a closed sum type"). Kept as a type alias rather than a new
/// wrapper so modules can build it with the same constructors as every
/// other crate in the workspace.
pub type ModuleError = RouteCodexError;

/// Raised by [`crate::hub::HubPipeline::execute`]. Carries the
/// partially-processed DTO and the stage id so `FailoverExecutor` can
/// classify without re-deriving context (§4.5).
#[derive(Debug)]
pub struct PipelineError {
    pub stage: ModuleSlot,
    pub error: ModuleError,
    pub partial: ClientRequest,
}

impl PipelineError {
    pub fn new(stage: ModuleSlot, error: ModuleError, partial: ClientRequest) -> Self {
        Self {
            stage,
            error,
            partial,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pipeline stage {:?} failed: {}",
            self.stage, self.error.message
        )
    }
}

impl std::error::Error for PipelineError {}
