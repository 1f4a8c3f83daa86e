use std::fmt;

use serde::{Deserialize, Serialize};

/// `providerId[#credentialAlias]`, the granularity at which quota state is
/// tracked (GLOSSARY: "Provider key").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderKey(String);

impl ProviderKey {
    pub fn new(provider_id: impl Into<String>, alias: Option<&str>) -> Self {
        let provider_id = provider_id.into();
        match alias {
            Some(alias) if !alias.is_empty() => Self(format!("{provider_id}#{alias}")),
            _ => Self(provider_id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare provider id, with any `#alias` suffix stripped.
    pub fn provider_id(&self) -> &str {
        self.0.split('#').next().unwrap_or(&self.0)
    }
}

impl From<String> for ProviderKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ProviderKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_alias_is_bare_provider_id() {
        let key = ProviderKey::new("openai", None);
        assert_eq!(key.as_str(), "openai");
        assert_eq!(key.provider_id(), "openai");
    }

    #[test]
    fn with_alias_is_shardable() {
        let key = ProviderKey::new("openai", Some("alias2"));
        assert_eq!(key.as_str(), "openai#alias2");
        assert_eq!(key.provider_id(), "openai");
    }
}
