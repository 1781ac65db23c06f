/// Error kinds surfaced by token construction and validation.
///
/// The classification is strict: each semantic check raises its own kind, and
/// per-key signature failures are accumulated into a single
/// [`Error::InvalidSignature`] report instead of aborting on the first
/// candidate key.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("signature validation failed: {0}")]
    InvalidSignature(String),
    #[error("no configured key matched the token kid: {0}")]
    SignatureKeyNotFound(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("lifetime validation failed: {0}")]
    InvalidLifetime(String),
    #[error("audience validation failed: {0}")]
    InvalidAudience(String),
    #[error("issuer validation failed: {0}")]
    InvalidIssuer(String),
    #[error("issuer signing key rejected: {0}")]
    InvalidSigningKey(String),
    #[error("token replay detected: {0}")]
    TokenReplay(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}
