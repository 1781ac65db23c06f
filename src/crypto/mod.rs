mod encryption;
mod keywrap;
mod signature;

pub use encryption::{AuthenticatedEncryptionProvider, EncryptionResult};
pub use keywrap::KeyWrapProvider;
pub use signature::SignatureProvider;

pub(crate) use encryption::AesCbcHmacProvider;
pub(crate) use keywrap::AesKeyWrapProvider;
pub(crate) use signature::{EcdsaSignatureProvider, HmacSignatureProvider, RsaSignatureProvider};

#[cfg(feature = "async-validate")]
use std::future::Future;
#[cfg(feature = "async-validate")]
use std::pin::Pin;

use crate::constants::{content_key_size, ECDSA_ALGS, HMAC_ALGS, KEY_WRAP_ALGS, RSA_ALGS};
use crate::error::Error;
use crate::keys::{KeyMaterial, SecurityKey};

#[cfg(feature = "async-validate")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Creates and releases cryptographic providers by `(key, algorithm)`.
///
/// The handler never touches a primitive directly; everything flows through a
/// factory so callers can swap in HSM-backed or caching implementations. The
/// `release_*` hooks default to dropping, but a pooling factory may reclaim
/// the provider (and evict a faulting one) instead.
pub trait CryptoProviderFactory: Send + Sync {
    /// Whether this factory can serve `algorithm` with the given key.
    fn is_supported_algorithm(&self, algorithm: &str, key: &SecurityKey) -> bool;

    /// Provider for producing signatures; requires private material.
    fn create_signing_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error>;

    /// Provider for verifying signatures; public material suffices.
    fn create_verifying_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error>;

    /// Authenticated-encryption provider keyed by a raw content-encryption key.
    fn create_authenticated_encryption_provider(
        &self,
        key: &[u8],
        algorithm: &str,
    ) -> Result<Box<dyn AuthenticatedEncryptionProvider>, Error>;

    fn create_key_wrap_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, Error>;

    fn release_signature_provider(&self, provider: Box<dyn SignatureProvider>) {
        drop(provider);
    }

    fn release_encryption_provider(&self, provider: Box<dyn AuthenticatedEncryptionProvider>) {
        drop(provider);
    }

    fn release_key_wrap_provider(&self, provider: Box<dyn KeyWrapProvider>) {
        drop(provider);
    }
}

/// Stateless factory over the built-in HMAC/RSA/ECDSA, AES-CBC+HMAC and
/// AES-KW providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCryptoProviderFactory;

static DEFAULT_FACTORY: DefaultCryptoProviderFactory = DefaultCryptoProviderFactory;

impl DefaultCryptoProviderFactory {
    pub fn shared() -> &'static DefaultCryptoProviderFactory {
        &DEFAULT_FACTORY
    }
}

impl CryptoProviderFactory for DefaultCryptoProviderFactory {
    fn is_supported_algorithm(&self, algorithm: &str, key: &SecurityKey) -> bool {
        if HMAC_ALGS.contains(&algorithm) {
            return key.symmetric_bytes().is_some_and(|k| !k.is_empty());
        }
        if RSA_ALGS.contains(&algorithm) {
            return matches!(
                key.material().verification_material(),
                KeyMaterial::Rsa { .. }
            );
        }
        if ECDSA_ALGS.contains(&algorithm) {
            return match key.material().verification_material() {
                KeyMaterial::P256 { .. } => algorithm == "ES256",
                KeyMaterial::P384 { .. } => algorithm == "ES384",
                KeyMaterial::P521 { .. } => algorithm == "ES512",
                _ => false,
            };
        }
        if KEY_WRAP_ALGS.contains(&algorithm) {
            let expected = match algorithm {
                "A128KW" => 16,
                "A192KW" => 24,
                _ => 32,
            };
            return key.symmetric_bytes().is_some_and(|k| k.len() == expected);
        }
        if let Some(size) = content_key_size(algorithm) {
            return key.symmetric_bytes().is_some_and(|k| k.len() == size);
        }
        false
    }

    fn create_signing_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error> {
        create_signature_provider(key, algorithm, true)
    }

    fn create_verifying_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error> {
        create_signature_provider(key, algorithm, false)
    }

    fn create_authenticated_encryption_provider(
        &self,
        key: &[u8],
        algorithm: &str,
    ) -> Result<Box<dyn AuthenticatedEncryptionProvider>, Error> {
        Ok(Box::new(AesCbcHmacProvider::new(key, algorithm)?))
    }

    fn create_key_wrap_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, Error> {
        let Some(kek) = key.symmetric_bytes() else {
            return Err(Error::NotSupported(format!(
                "key wrap algorithm {algorithm} requires a symmetric key, got {}",
                key.describe()
            )));
        };
        Ok(Box::new(AesKeyWrapProvider::new(kek, algorithm)?))
    }
}

fn create_signature_provider(
    key: &SecurityKey,
    algorithm: &str,
    for_signing: bool,
) -> Result<Box<dyn SignatureProvider>, Error> {
    if HMAC_ALGS.contains(&algorithm) {
        let Some(bytes) = key.symmetric_bytes() else {
            return Err(unsupported(key, algorithm));
        };
        return Ok(Box::new(HmacSignatureProvider::new(bytes, algorithm)?));
    }

    let material = key.material().verification_material();
    if RSA_ALGS.contains(&algorithm) {
        if let KeyMaterial::Rsa { private, public } = material {
            if for_signing && private.is_none() {
                return Err(missing_private(key, algorithm));
            }
            return Ok(Box::new(RsaSignatureProvider::new(
                private.clone(),
                public.clone(),
                algorithm,
            )));
        }
        return Err(unsupported(key, algorithm));
    }
    if ECDSA_ALGS.contains(&algorithm) {
        let matches_curve = match material {
            KeyMaterial::P256 { .. } => algorithm == "ES256",
            KeyMaterial::P384 { .. } => algorithm == "ES384",
            KeyMaterial::P521 { .. } => algorithm == "ES512",
            _ => false,
        };
        if !matches_curve {
            return Err(unsupported(key, algorithm));
        }
        let provider = EcdsaSignatureProvider::new(material, algorithm)?;
        if for_signing && !provider.can_sign() {
            return Err(missing_private(key, algorithm));
        }
        return Ok(Box::new(provider));
    }
    Err(unsupported(key, algorithm))
}

fn unsupported(key: &SecurityKey, algorithm: &str) -> Error {
    Error::NotSupported(format!(
        "algorithm {algorithm} is not supported for key {}",
        key.describe()
    ))
}

fn missing_private(key: &SecurityKey, algorithm: &str) -> Error {
    Error::NotSupported(format!(
        "signing with {algorithm} requires private material on key {}",
        key.describe()
    ))
}
