use std::sync::Arc;

use routecodex_common::{ErrorSeries, RouteCodexError};
use routecodex_provider_core::{ModuleConfig, ModuleSlot, PipelineTemplate};

use crate::errors::ModuleError;
use crate::hub::HubPipeline;
use crate::module::PipelineModule;
use crate::modules::{HeaderStampingProvider, HttpProviderHttp, PassthroughLlmSwitch, ShapeFilterCompatibility};

/// Instantiates the built-in module for one `ModuleConfig` (SPEC_FULL
/// §4.4 supplement). A deployment wiring a third-party module id would
/// extend this match arm; the core ships only the four minimum-viable
/// instances.
fn build_module(config: &ModuleConfig) -> Result<Arc<dyn PipelineModule>, ModuleError> {
    match (config.slot, config.module_id.as_str()) {
        (ModuleSlot::LlmSwitch, "passthrough") => Ok(Arc::new(PassthroughLlmSwitch)),
        (ModuleSlot::Compatibility, "shape-filter") => {
            Ok(Arc::new(ShapeFilterCompatibility::new(config.config.clone())?))
        }
        (ModuleSlot::Provider, "header-stamping") => {
            Ok(Arc::new(HeaderStampingProvider::new(config.config.clone())?))
        }
        (ModuleSlot::ProviderHttp, "http") => Ok(Arc::new(HttpProviderHttp::new())),
        (slot, module_id) => Err(RouteCodexError::new(
            ErrorSeries::Efatal,
            "CONFIG",
            format!("no built-in module {module_id:?} for slot {slot:?}"),
        )),
    }
}

/// Builds a fresh `HubPipeline` for one `PipelineTemplate` (§4.5:
/// "Built fresh per attempt by FailoverExecutor from the target's
/// PipelineTemplate").
pub fn build_pipeline(template: &PipelineTemplate) -> Result<HubPipeline, ModuleError> {
    let module_for = |slot: ModuleSlot| -> Result<Arc<dyn PipelineModule>, ModuleError> {
        let config = template.module_for(slot).ok_or_else(|| {
            RouteCodexError::new(ErrorSeries::Efatal, "CONFIG", format!("template missing slot {slot:?}"))
        })?;
        build_module(config)
    };

    Ok(HubPipeline::new(
        module_for(ModuleSlot::LlmSwitch)?,
        module_for(ModuleSlot::Compatibility)?,
        module_for(ModuleSlot::Provider)?,
        module_for(ModuleSlot::ProviderHttp)?,
        template.stream_buffered,
    ))
}
