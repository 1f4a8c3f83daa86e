use thiserror::Error;

/// `ConfigView` lookups return a present/missing sum type rather than
/// throwing (§4.1); these are the only two failure modes that cross the
/// crate boundary.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential descriptor named {0:?} in ConfigView")]
    UnknownDescriptor(String),
    /// The caller (FailoverExecutor) must treat this as EFATAL, never
    /// retryable (§4.2).
    #[error("credential file missing or malformed: {0}")]
    MissingCredential(String),
}
