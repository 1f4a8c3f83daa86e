//! Shared primitives for the RouteCodex workspace.
//!
//! Kept deliberately small: newtypes and a closed error taxonomy that every
//! other crate in the workspace depends on, so that none of them need to
//! agree on ad-hoc `String`/`serde_json::Value` conventions for the same
//! concept.

mod error;
mod route_key;
mod provider_key;
mod time;

pub use error::{ErrorSeries, RouteCodexError};
pub use provider_key::ProviderKey;
pub use route_key::RouteKey;
pub use time::now_ms;
