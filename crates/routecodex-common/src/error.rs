use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ProviderKey;

/// Normalized upstream error classification (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeries {
    /// Credential/config scoped or otherwise unrecoverable by retry.
    Efatal,
    /// HTTP 429 or a rate/quota coded error.
    E429,
    /// HTTP 5xx.
    E5xx,
    /// Transport-level network failure (timeout, connection reset, DNS, ...).
    Enet,
    /// Anything that doesn't classify as the above.
    Eother,
}

impl ErrorSeries {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Efatal => "EFATAL",
            Self::E429 => "E429",
            Self::E5xx => "E5XX",
            Self::Enet => "ENET",
            Self::Eother => "EOTHER",
        }
    }
}

/// A closed, serializable error envelope carried between components
/// (§9 design notes: "normalize to a closed sum type ... Classification is
/// a pure function; callers pattern-match").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCodexError {
    pub series: ErrorSeries,
    pub http_status: Option<u16>,
    pub code: String,
    pub message: String,
    pub provider_key: Option<ProviderKey>,
    /// Bounded bag of extra diagnostic fields; never read by routing logic.
    pub details: BTreeMap<String, String>,
    /// True when the provider-impl / upstream call asserted this is
    /// unconditionally fatal (maps directly to `ErrorEvent.fatal`).
    pub fatal: bool,
}

impl RouteCodexError {
    pub fn new(series: ErrorSeries, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            series,
            http_status: None,
            code: code.into(),
            message: message.into(),
            provider_key: None,
            details: BTreeMap::new(),
            fatal: matches!(series, ErrorSeries::Efatal),
        }
    }

    pub fn with_provider_key(mut self, key: ProviderKey) -> Self {
        self.provider_key = Some(key);
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
