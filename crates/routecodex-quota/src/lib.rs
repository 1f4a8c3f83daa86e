//! C3: the per-provider quota/cooldown state machine (§4.3). Owns the
//! only mutable copy of every `ProviderQuotaState`; every other crate
//! reaches it through `ProviderQuotaCenter`'s event API and read-only
//! snapshot/eligibility calls.

mod center;
mod classify;
mod events;
mod state;
mod transitions;

pub use center::{Eligibility, ProviderQuotaCenter, QuotaSummary};
pub use classify::{cooldown_schedule, cooldown_step_ms, normalize_error_series, ERROR_CHAIN_WINDOW_MS};
pub use events::{ErrorEvent, ErrorRecord, SuccessEvent, TickEvent, UsageEvent};
pub use state::{AuthType, ProviderQuotaState, Reason};
