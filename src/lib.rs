#![forbid(unsafe_code)]

//! JWT issuance and validation over the JWS/JWE compact serializations.
//!
//! [`TokenBuilder`] turns a claim set plus signing (and optionally
//! encrypting) credentials into a compact string; [`TokenValidator`] parses
//! a compact string, resolves the verification key, verifies the signature,
//! decrypts when needed, and validates the semantic claims. Cryptographic
//! primitives are consumed through [`CryptoProviderFactory`]; the bundled
//! [`DefaultCryptoProviderFactory`] covers the HMAC/RSA/ECDSA signature
//! algorithms, AES-CBC+HMAC content encryption, and AES key wrap.

mod base64url;
mod builder;
mod constants;
mod credentials;
mod crypto;
mod error;
mod header_cache;
mod keys;
mod reader;
mod replay;
mod token;
mod validator;

pub use builder::TokenBuilder;
pub use constants::{DEFAULT_CLOCK_SKEW, DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES, JWT_TYPE};
pub use credentials::{EncryptingCredentials, SigningCredentials};
#[cfg(feature = "async-validate")]
pub use crypto::BoxFuture;
pub use crypto::{
    AuthenticatedEncryptionProvider, CryptoProviderFactory, DefaultCryptoProviderFactory,
    EncryptionResult, KeyWrapProvider, SignatureProvider,
};
pub use error::Error;
pub use header_cache::HeaderCache;
pub use keys::SecurityKey;
pub use reader::TokenReader;
pub use replay::{InMemoryReplayCache, TokenReplayCache};
pub use token::{CompactToken, JwtHeader};
pub use validator::{
    IssuerSigningKeyResolverFn, SignatureValidatorFn, TokenReaderFn, TokenValidator,
    ValidatedToken, ValidationParameters,
};
