//! C8: the HTTP edge. Classifies inbound requests into a route key, hands
//! them to `FailoverExecutor`, and renders the result (or failure) back
//! into the wire shapes of §6/§7.
//!
//! Knows nothing about how a route was picked or how quota is tracked;
//! only `routecodex-router`'s public result types.

mod classify;
mod dto;
mod error_response;
mod handlers;
mod router;
mod state;

pub use classify::{RequestSignals, classify, signals_from_body};
pub use dto::{EntryProtocol, build_client_request};
pub use router::build_router;
pub use state::GatewayState;
