use serde::{Deserialize, Serialize};

/// A credential descriptor as stored in `ConfigView` (§3). Variants mirror
/// the five recognized in spec.md exactly; the core never invents more
/// (unlike the reference proxy's wider `Credential` enum, which also tracks
/// several provider-specific OAuth shapes, out of scope here per §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CredentialDescriptor {
    Apikey {
        header: String,
        prefix: String,
        value: String,
    },
    Bearer {
        token: String,
        /// Unix millis.
        expires_at: Option<i64>,
    },
    Oauth {
        token_file: String,
        refresh_policy: RefreshPolicy,
    },
    Cookie {
        file: String,
    },
    DeepseekAccount {
        token_file: String,
    },
    AntigravityOauth {
        token_file: String,
        alias: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefreshPolicy {
    /// Emit an out-of-band refresh event when the token is within this many
    /// seconds of `expires_at`.
    pub skew_secs: u64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self { skew_secs: 60 }
    }
}

impl CredentialDescriptor {
    /// The credential's family tag, used to check compatibility against a
    /// provider's family (§3 invariant).
    pub fn family(&self) -> &'static str {
        match self {
            Self::Apikey { .. } => "apikey",
            Self::Bearer { .. } => "bearer",
            Self::Oauth { .. } => "oauth",
            Self::Cookie { .. } => "cookie",
            Self::DeepseekAccount { .. } => "deepseek-account",
            Self::AntigravityOauth { .. } => "antigravity-oauth",
        }
    }

    /// The on-disk file this credential reads per request, if any. Used to
    /// key the CredentialStore's (path, mtime) cache.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::Oauth { token_file, .. } => Some(token_file),
            Self::Cookie { file } => Some(file),
            Self::DeepseekAccount { token_file } => Some(token_file),
            Self::AntigravityOauth { token_file, .. } => Some(token_file),
            Self::Apikey { .. } | Self::Bearer { .. } => None,
        }
    }
}
