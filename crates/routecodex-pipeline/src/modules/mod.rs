//! Minimum-viable built-in instances of each Hub Pipeline slot (SPEC_FULL
//! §4.4 supplement). Structurally complete; intentionally thin on
//! per-protocol field mapping, which is out of core scope (§1).

mod compatibility;
mod llm_switch;
mod provider;
mod provider_http;

pub use compatibility::{ShapeFilterCompatibility, ShapeFilterConfig};
pub use llm_switch::PassthroughLlmSwitch;
pub use provider::{HeaderStampingConfig, HeaderStampingProvider};
pub use provider_http::HttpProviderHttp;
