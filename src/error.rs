/// Failure kinds that abort a report run.
///
/// Library functions return `anyhow::Result`; use
/// `err.downcast_ref::<Error>()` to recover the kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The service rejected the credential (expired, revoked or lacking
    /// scope).
    #[error("GitHub rejected the credential: {0}")]
    AuthRejected(String),

    /// Network or service failure on a page or lookup.
    #[error("GitHub request failed: {0}")]
    Transport(String),

    /// The response lacked fields the query guarantees.
    #[error("malformed GitHub response: {0}")]
    MalformedResponse(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::AuthRejected(_))
    }
}
