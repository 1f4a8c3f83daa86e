//! Data model and read-side contracts for RouteCodex: `ConfigView` (C1) and
//! `CredentialStore` (C2), plus the `Provider`/`Credential`/`RoutePool`
//! types every other crate in the workspace builds on.
//!
//! This crate intentionally has no knowledge of HTTP, quota state, or
//! pipeline execution; those live in `routecodex-quota`,
//! `routecodex-pipeline`, and `routecodex-router` respectively.

mod config_view;
mod credential;
mod credential_store;
mod errors;
mod events;
mod pipeline_template;
mod provider;
mod route_pool;

pub use config_view::{ConfigSnapshot, ConfigView};
pub use credential::{CredentialDescriptor, RefreshPolicy};
pub use credential_store::{CredentialStore, Materialized};
pub use errors::CredentialError;
pub use events::{EventHub, EventSink};
pub use pipeline_template::{ModuleConfig, ModuleSlot, PipelineTemplate, SLOT_ORDER};
pub use provider::{AuthDescriptor, ModelEntry, Provider};
pub use route_pool::{RouteMode, RoutePool, RouteTarget};
