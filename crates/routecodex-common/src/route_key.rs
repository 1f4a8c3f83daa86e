use serde::{Deserialize, Serialize};

/// A semantic route key derived from an inbound request (GLOSSARY: "Route
/// key"). Unrecognized values fall back to [`RouteKey::Default`] per §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKey {
    Default,
    Thinking,
    Coding,
    Longcontext,
    Tools,
    Vision,
    Websearch,
    Background,
    WebSearch,
    /// Any header-supplied value not in the recognized set. Still routed,
    /// but `pool()` lookups for it fall back to `Default` (§3).
    Custom(String),
}

impl RouteKey {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "default" => Self::Default,
            "thinking" => Self::Thinking,
            "coding" => Self::Coding,
            "longcontext" => Self::Longcontext,
            "tools" => Self::Tools,
            "vision" => Self::Vision,
            "websearch" => Self::Websearch,
            "background" => Self::Background,
            "web_search" => Self::WebSearch,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Default => "default",
            Self::Thinking => "thinking",
            Self::Coding => "coding",
            Self::Longcontext => "longcontext",
            Self::Tools => "tools",
            Self::Vision => "vision",
            Self::Websearch => "websearch",
            Self::Background => "background",
            Self::WebSearch => "web_search",
            Self::Custom(raw) => raw.as_str(),
        }
    }

    /// True for any key the route table recognizes natively; `Custom` keys
    /// always miss and must fall back to `Default` at the `ConfigView`.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_custom_and_unrecognized() {
        let key = RouteKey::parse("some-made-up-header-value");
        assert!(!key.is_recognized());
        assert_eq!(key.as_str(), "some-made-up-header-value");
    }

    #[test]
    fn known_keys_roundtrip() {
        for raw in [
            "default",
            "thinking",
            "coding",
            "longcontext",
            "tools",
            "vision",
            "websearch",
            "background",
            "web_search",
        ] {
            let key = RouteKey::parse(raw);
            assert!(key.is_recognized());
            assert_eq!(key.as_str(), raw);
        }
    }
}
