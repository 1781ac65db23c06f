use std::sync::Arc;
use std::time::Duration;

use crate::constants::DEFAULT_CLOCK_SKEW;
use crate::crypto::{CryptoProviderFactory, DefaultCryptoProviderFactory};
use crate::error::Error;
use crate::keys::SecurityKey;
use crate::replay::TokenReplayCache;
use crate::token::CompactToken;

/// Replaces the built-in reader during validation.
pub type TokenReaderFn = dyn Fn(&str) -> Result<CompactToken, Error> + Send + Sync;

/// Replaces the whole built-in signature logic; must return a signed-token
/// shape.
pub type SignatureValidatorFn =
    dyn Fn(&str, &ValidationParameters) -> Result<CompactToken, Error> + Send + Sync;

/// Replaces built-in signing-key resolution; an empty result falls back to
/// trying every configured key.
pub type IssuerSigningKeyResolverFn =
    dyn Fn(&CompactToken, &ValidationParameters) -> Vec<SecurityKey> + Send + Sync;

/// Per-call validation policy. Every override, when present, is consulted
/// before the built-in behavior it shadows.
#[derive(Clone)]
pub struct ValidationParameters {
    pub issuer_signing_key: Option<SecurityKey>,
    pub issuer_signing_keys: Vec<SecurityKey>,
    pub issuer_signing_key_resolver: Option<Arc<IssuerSigningKeyResolverFn>>,
    pub signature_validator: Option<Arc<SignatureValidatorFn>>,
    pub token_reader: Option<Arc<TokenReaderFn>>,
    pub require_signed_tokens: bool,
    pub validate_actor: bool,
    pub actor_validation_parameters: Option<Box<ValidationParameters>>,
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
    pub valid_issuers: Vec<String>,
    pub valid_audiences: Vec<String>,
    pub clock_skew: Duration,
    pub token_replay_cache: Option<Arc<dyn TokenReplayCache>>,
    pub validate_issuer_signing_key: bool,
    pub token_decryption_key: Option<SecurityKey>,
    pub token_decryption_keys: Vec<SecurityKey>,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            issuer_signing_key: None,
            issuer_signing_keys: Vec::new(),
            issuer_signing_key_resolver: None,
            signature_validator: None,
            token_reader: None,
            require_signed_tokens: true,
            validate_actor: false,
            actor_validation_parameters: None,
            crypto_provider_factory: None,
            valid_issuers: Vec::new(),
            valid_audiences: Vec::new(),
            clock_skew: DEFAULT_CLOCK_SKEW,
            token_replay_cache: None,
            validate_issuer_signing_key: false,
            token_decryption_key: None,
            token_decryption_keys: Vec::new(),
        }
    }
}

impl ValidationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer_signing_key(mut self, key: SecurityKey) -> Self {
        self.issuer_signing_key = Some(key);
        self
    }

    pub fn with_issuer_signing_keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = SecurityKey>,
    {
        self.issuer_signing_keys = keys.into_iter().collect();
        self
    }

    pub fn with_issuer_signing_key_resolver(
        mut self,
        resolver: Arc<IssuerSigningKeyResolverFn>,
    ) -> Self {
        self.issuer_signing_key_resolver = Some(resolver);
        self
    }

    pub fn with_signature_validator(mut self, validator: Arc<SignatureValidatorFn>) -> Self {
        self.signature_validator = Some(validator);
        self
    }

    pub fn with_token_reader(mut self, reader: Arc<TokenReaderFn>) -> Self {
        self.token_reader = Some(reader);
        self
    }

    pub fn with_require_signed_tokens(mut self, required: bool) -> Self {
        self.require_signed_tokens = required;
        self
    }

    pub fn with_validate_actor(mut self, validate: bool) -> Self {
        self.validate_actor = validate;
        self
    }

    pub fn with_actor_validation_parameters(mut self, params: ValidationParameters) -> Self {
        self.actor_validation_parameters = Some(Box::new(params));
        self
    }

    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub fn with_valid_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.valid_issuers.push(issuer.into());
        self
    }

    pub fn with_valid_audience(mut self, audience: impl Into<String>) -> Self {
        self.valid_audiences.push(audience.into());
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    pub fn with_token_replay_cache(mut self, cache: Arc<dyn TokenReplayCache>) -> Self {
        self.token_replay_cache = Some(cache);
        self
    }

    pub fn with_validate_issuer_signing_key(mut self, validate: bool) -> Self {
        self.validate_issuer_signing_key = validate;
        self
    }

    pub fn with_token_decryption_key(mut self, key: SecurityKey) -> Self {
        self.token_decryption_key = Some(key);
        self
    }

    pub fn with_token_decryption_keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = SecurityKey>,
    {
        self.token_decryption_keys = keys.into_iter().collect();
        self
    }

    pub(crate) fn all_signing_keys(&self) -> impl Iterator<Item = &SecurityKey> {
        self.issuer_signing_key
            .iter()
            .chain(self.issuer_signing_keys.iter())
    }

    pub(crate) fn all_decryption_keys(&self) -> impl Iterator<Item = &SecurityKey> {
        self.token_decryption_key
            .iter()
            .chain(self.token_decryption_keys.iter())
    }

    pub(crate) fn factory(&self) -> &dyn CryptoProviderFactory {
        match &self.crypto_provider_factory {
            Some(factory) => factory.as_ref(),
            None => DefaultCryptoProviderFactory::shared(),
        }
    }
}
