use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use routecodex_common::ProviderKey;
use routecodex_quota::ProviderQuotaState;

use crate::errors::StorageError;

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk shape of `<userDir>/quota/provider-quota.json` (§6, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: u32,
    pub updated_at: i64,
    pub providers: HashMap<ProviderKey, ProviderQuotaState>,
}

/// Writer/reader for the quota snapshot file. Writes are atomic
/// (write-to-temp, then `rename`), the same durability pattern the pack's
/// file-based work queue uses for its pending/in-progress moves.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persists `providers` as the current snapshot (§4.9).
    pub async fn save(
        &self,
        providers: &HashMap<ProviderKey, ProviderQuotaState>,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_err(parent, source))?;
        }

        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            updated_at: now_ms,
            providers: providers.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|source| StorageError::SnapshotCorrupt {
            path: self.path.display().to_string(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|source| io_err(&tmp_path, source))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| io_err(&self.path, source))?;
        Ok(())
    }

    /// Loads the snapshot if present. Returns `Ok(None)` when the file
    /// doesn't exist yet (fresh startup, §4.9: "else begins empty"); a
    /// present-but-malformed file is a [`StorageError::SnapshotCorrupt`]
    /// so the caller can refuse to start rather than silently discard
    /// state (§6 exit code 10).
    pub async fn load(&self) -> Result<Option<SnapshotFile>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_err(&self.path, source)),
        };
        let parsed: SnapshotFile =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::SnapshotCorrupt {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(Some(parsed))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routecodex_quota::AuthType;

    fn tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rc-snapshot-test-{}", uuid_like()))
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let store = SnapshotStore::new(tmp_dir().join("provider-quota.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn p8_round_trip_preserves_state() {
        let dir = tmp_dir();
        let store = SnapshotStore::new(dir.join("provider-quota.json"));

        let mut providers = HashMap::new();
        let key: ProviderKey = "openai".into();
        providers.insert(key.clone(), ProviderQuotaState::fresh(AuthType::Apikey, 0));

        store.save(&providers, 0).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.providers[&key].reason, providers[&key].reason);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported_distinctly() {
        let dir = tmp_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("provider-quota.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = SnapshotStore::new(path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, StorageError::SnapshotCorrupt { .. }));

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
