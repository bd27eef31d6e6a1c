/// Errors that can occur while admitting a session or issuing a token.
///
/// Every admission failure is terminal for that connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("missing credential")]
    MissingCredential,

    /// The credential is malformed, has a bad signature, or has expired.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The credential verified but its identity is not a valid owner id.
    #[error("malformed identity in credential: {0:?}")]
    MalformedIdentity(String),

    /// Signing a new credential failed.
    #[error("failed to sign credential: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}
