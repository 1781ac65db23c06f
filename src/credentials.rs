use std::sync::Arc;

use crate::crypto::{CryptoProviderFactory, DefaultCryptoProviderFactory};
use crate::keys::SecurityKey;

/// Key and JWS algorithm used to sign produced tokens.
#[derive(Clone)]
pub struct SigningCredentials {
    key: SecurityKey,
    algorithm: String,
    crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl SigningCredentials {
    pub fn new(key: SecurityKey, algorithm: impl Into<String>) -> Self {
        Self {
            key,
            algorithm: algorithm.into(),
            crypto_provider_factory: None,
        }
    }

    /// Overrides the factory used when signing with these credentials.
    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub fn key(&self) -> &SecurityKey {
        &self.key
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub(crate) fn factory(&self) -> &dyn CryptoProviderFactory {
        match &self.crypto_provider_factory {
            Some(factory) => factory.as_ref(),
            None => DefaultCryptoProviderFactory::shared(),
        }
    }

    /// Cache key for the encoded header: key identity plus algorithm.
    pub(crate) fn fingerprint(&self) -> String {
        format!("{}|{}", self.key.fingerprint(), self.algorithm)
    }
}

/// Key-management and content-encryption algorithms used to produce a JWE.
///
/// With `alg == "dir"` the key itself is the content-encryption key and the
/// second JWE segment stays empty; otherwise a fresh CEK is generated and
/// wrapped under `alg`.
#[derive(Clone)]
pub struct EncryptingCredentials {
    key: SecurityKey,
    alg: String,
    enc: String,
    crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl EncryptingCredentials {
    pub fn new(key: SecurityKey, alg: impl Into<String>, enc: impl Into<String>) -> Self {
        Self {
            key,
            alg: alg.into(),
            enc: enc.into(),
            crypto_provider_factory: None,
        }
    }

    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub fn key(&self) -> &SecurityKey {
        &self.key
    }

    pub fn alg(&self) -> &str {
        &self.alg
    }

    pub fn enc(&self) -> &str {
        &self.enc
    }

    pub(crate) fn factory(&self) -> &dyn CryptoProviderFactory {
        match &self.crypto_provider_factory {
            Some(factory) => factory.as_ref(),
            None => DefaultCryptoProviderFactory::shared(),
        }
    }
}
