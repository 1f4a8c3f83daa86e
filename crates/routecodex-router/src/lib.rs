//! The routing/retry layer: `VirtualRouter` (C6) and `FailoverExecutor`
//! (C7). Reads `ConfigView` and `ProviderQuotaCenter` but never mutates
//! the former and only ever talks to the latter through its event API.

mod failover;
mod virtual_router;

pub use failover::{FailoverError, FailoverExecutor};
pub use virtual_router::{RouteTargetPick, RouterError, VirtualRouter};
