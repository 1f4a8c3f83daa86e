//! The glue crate: `Runtime` (explicit dependency injection over C1-C9),
//! the concrete upstream HTTP client, the CLI/env configuration boundary,
//! and the optional shadow-run fan-out. Everything else in the workspace
//! stays ignorant of axum, reqwest, and clap; this crate is where those
//! concrete choices live (§9 design notes).

mod config;
mod runtime;
mod shadow;
mod upstream_client;

pub use config::RuntimeConfig;
pub use runtime::{BootstrapError, Runtime};
pub use shadow::{ShadowDiff, ShadowRunner};
pub use upstream_client::ReqwestUpstreamClient;
