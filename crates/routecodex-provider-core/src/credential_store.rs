use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use serde::Deserialize;
use tokio::sync::RwLock;

use routecodex_common::now_ms;

use crate::credential::CredentialDescriptor;
use crate::errors::CredentialError;

/// Resolved auth material ready to stamp onto an outbound request (§4.2).
#[derive(Debug, Clone)]
pub struct Materialized {
    pub header_name: String,
    pub header_value: String,
    /// Distinguishes credential aliases so `ProviderQuotaCenter` can shard
    /// quota state per credential, e.g. `providerId#alias2`.
    pub scope_tag: String,
    /// Set when the token is close enough to `expires_at` that an
    /// out-of-band refresh should be triggered. The refresh itself is out
    /// of core scope (§4.2); core only surfaces the signal.
    pub needs_refresh: bool,
}

#[derive(Debug, Deserialize)]
struct TokenFileContents {
    token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

struct CacheEntry {
    mtime: SystemTime,
    materialized: Materialized,
}

/// Resolves named credential refs to current auth material, with a
/// (path, mtime)-keyed in-memory cache so out-of-band refreshes are
/// observed without restart (§4.2, §5 shared resources).
pub struct CredentialStore {
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a descriptor to materialized auth headers. `provider_id` and
    /// `route_hint` only affect the `scope_tag` when the descriptor itself
    /// carries no alias (e.g. plain `apikey`/`bearer`).
    pub async fn resolve(
        &self,
        provider_id: &str,
        descriptor: &CredentialDescriptor,
    ) -> Result<Materialized, CredentialError> {
        match descriptor {
            CredentialDescriptor::Apikey {
                header,
                prefix,
                value,
            } => Ok(Materialized {
                header_name: header.clone(),
                header_value: format!("{prefix}{value}"),
                scope_tag: provider_id.to_string(),
                needs_refresh: false,
            }),
            CredentialDescriptor::Bearer { token, expires_at } => Ok(Materialized {
                header_name: "Authorization".to_string(),
                header_value: format!("Bearer {token}"),
                scope_tag: provider_id.to_string(),
                needs_refresh: within_skew(*expires_at, 60),
            }),
            CredentialDescriptor::Oauth {
                token_file,
                refresh_policy,
            } => {
                self.resolve_token_file(provider_id, token_file, refresh_policy.skew_secs, None)
                    .await
            }
            CredentialDescriptor::Cookie { file } => self.resolve_cookie_file(provider_id, file).await,
            CredentialDescriptor::DeepseekAccount { token_file } => {
                self.resolve_token_file(provider_id, token_file, 60, None).await
            }
            CredentialDescriptor::AntigravityOauth { token_file, alias } => {
                self.resolve_token_file(provider_id, token_file, 60, Some(alias.as_str()))
                    .await
            }
        }
    }

    async fn resolve_token_file(
        &self,
        provider_id: &str,
        path: &str,
        skew_secs: u64,
        alias: Option<&str>,
    ) -> Result<Materialized, CredentialError> {
        let mtime = file_mtime(path)
            .await
            .ok_or_else(|| CredentialError::MissingCredential(path.to_string()))?;

        if let Some(entry) = self.cache.read().await.get(path) {
            if entry.mtime == mtime {
                return Ok(entry.materialized.clone());
            }
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| CredentialError::MissingCredential(path.to_string()))?;
        let parsed: TokenFileContents = serde_json::from_str(&contents)
            .map_err(|_| CredentialError::MissingCredential(path.to_string()))?;

        let scope_tag = match alias {
            Some(alias) => format!("{provider_id}#{alias}"),
            None => provider_id.to_string(),
        };
        let materialized = Materialized {
            header_name: "Authorization".to_string(),
            header_value: format!("Bearer {}", parsed.token),
            scope_tag,
            needs_refresh: within_skew(parsed.expires_at, skew_secs),
        };

        self.cache.write().await.insert(
            path.to_string(),
            CacheEntry {
                mtime,
                materialized: materialized.clone(),
            },
        );
        Ok(materialized)
    }

    async fn resolve_cookie_file(
        &self,
        provider_id: &str,
        path: &str,
    ) -> Result<Materialized, CredentialError> {
        let mtime = file_mtime(path)
            .await
            .ok_or_else(|| CredentialError::MissingCredential(path.to_string()))?;

        if let Some(entry) = self.cache.read().await.get(path) {
            if entry.mtime == mtime {
                return Ok(entry.materialized.clone());
            }
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| CredentialError::MissingCredential(path.to_string()))?;
        let cookie = contents.trim();
        if cookie.is_empty() {
            return Err(CredentialError::MissingCredential(path.to_string()));
        }

        let materialized = Materialized {
            header_name: "Cookie".to_string(),
            header_value: cookie.to_string(),
            scope_tag: provider_id.to_string(),
            needs_refresh: false,
        };
        self.cache.write().await.insert(
            path.to_string(),
            CacheEntry {
                mtime,
                materialized: materialized.clone(),
            },
        );
        Ok(materialized)
    }
}

async fn file_mtime(path: &str) -> Option<SystemTime> {
    tokio::fs::metadata(Path::new(path))
        .await
        .ok()?
        .modified()
        .ok()
}

fn within_skew(expires_at: Option<i64>, skew_secs: u64) -> bool {
    match expires_at {
        Some(expires_at) => now_ms() + (skew_secs as i64) * 1000 >= expires_at,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn apikey_resolves_without_io() {
        let store = CredentialStore::new();
        let descriptor = CredentialDescriptor::Apikey {
            header: "Authorization".into(),
            prefix: "Bearer ".into(),
            value: "sk-test".into(),
        };
        let materialized = store.resolve("openai", &descriptor).await.unwrap();
        assert_eq!(materialized.header_value, "Bearer sk-test");
        assert_eq!(materialized.scope_tag, "openai");
    }

    #[tokio::test]
    async fn missing_token_file_is_missing_credential() {
        let store = CredentialStore::new();
        let descriptor = CredentialDescriptor::Oauth {
            token_file: "/nonexistent/path/token.json".into(),
            refresh_policy: Default::default(),
        };
        let err = store.resolve("codex", &descriptor).await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn oauth_token_file_is_cached_until_mtime_changes() {
        let dir = std::env::temp_dir().join(format!("rc-cred-test-{}", uuid_like()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("token.json");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            write!(f, r#"{{"token":"abc","expires_at":9999999999999}}"#).unwrap();
        }

        let store = CredentialStore::new();
        let descriptor = CredentialDescriptor::Oauth {
            token_file: path.to_str().unwrap().to_string(),
            refresh_policy: Default::default(),
        };
        let first = store.resolve("codex", &descriptor).await.unwrap();
        assert_eq!(first.header_value, "Bearer abc");
        assert!(!first.needs_refresh);

        // Same mtime: cache should still answer with the first value even
        // if the file changes without the mtime advancing on this fs.
        let second = store.resolve("codex", &descriptor).await.unwrap();
        assert_eq!(second.header_value, first.header_value);

        std::fs::remove_dir_all(&dir).ok();
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }
}
