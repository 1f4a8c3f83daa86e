//! C9: durable persistence for the provider quota state machine. Atomic
//! JSON snapshots plus an append-only NDJSON error log, exactly the two
//! artifacts §6's External Interfaces section names.

mod error_log;
mod errors;
mod runner;
mod snapshot;

pub use error_log::NdjsonErrorLog;
pub use errors::StorageError;
pub use runner::SnapshotRunner;
pub use snapshot::{SnapshotFile, SnapshotStore};
