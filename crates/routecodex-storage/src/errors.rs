use thiserror::Error;

/// Failures from the snapshot/error-log layer (C9, §6, §9). A corrupt
/// snapshot is distinguished from a merely-missing one so the caller can
/// map it to exit code 10 ("snapshot corruption refused") instead of
/// silently starting from empty state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path} is corrupt: {source}")]
    SnapshotCorrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
