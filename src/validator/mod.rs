use zeroize::Zeroize as _;

use crate::base64url;
use crate::constants::{ALG_DIRECT, JWE_SEGMENT_COUNT, MAX_ACTOR_DEPTH};
use crate::error::Error;
use crate::keys::SecurityKey;
use crate::reader::TokenReader;
use crate::token::CompactToken;

#[cfg(feature = "async-validate")]
use crate::crypto::BoxFuture;

mod helpers;
pub(crate) mod params;

pub use params::{
    IssuerSigningKeyResolverFn, SignatureValidatorFn, TokenReaderFn, ValidationParameters,
};

/// Outcome of a successful validation. `signing_key` is populated when the
/// signature was verified by the built-in trial; a signature-validator
/// override reports none.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub token: CompactToken,
    pub signing_key: Option<SecurityKey>,
    pub issuer: Option<String>,
}

/// Orchestrates the validation pipeline: decryption when the token is a JWE,
/// signature verification over the candidate keys, then the semantic claim
/// checks in a fixed order. No claim is evaluated before the signature phase
/// has completed or been explicitly bypassed.
#[derive(Default)]
pub struct TokenValidator {
    reader: TokenReader,
}

impl TokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(mut self, reader: TokenReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn reader(&self) -> &TokenReader {
        &self.reader
    }

    pub fn validate(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<ValidatedToken, Error> {
        self.validate_at_depth(token, params, 0)
    }

    /// Suspension-capable flavour; suspends at signature verification and
    /// recursive actor validation. Dropping the future before completion
    /// releases any held provider and validates nothing.
    #[cfg(feature = "async-validate")]
    pub async fn validate_async(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<ValidatedToken, Error> {
        self.validate_async_at_depth(token, params, 0).await
    }

    fn validate_at_depth(
        &self,
        raw: &str,
        params: &ValidationParameters,
        depth: usize,
    ) -> Result<ValidatedToken, Error> {
        self.check_preconditions(raw)?;
        if is_jwe_form(raw) {
            let parsed = self.read_token(raw, params)?;
            let inner = decrypt_token(&parsed, params)?;
            if is_jwe_form(&inner) {
                return Err(Error::MalformedToken(
                    "nested encrypted tokens are not supported".to_string(),
                ));
            }
            return self.validate_at_depth(&inner, params, depth);
        }
        let (token, signing_key) = self.validate_signature(raw, params)?;
        self.validate_payload(token, signing_key, params, depth)
    }

    #[cfg(feature = "async-validate")]
    fn validate_async_at_depth<'a>(
        &'a self,
        raw: &'a str,
        params: &'a ValidationParameters,
        depth: usize,
    ) -> BoxFuture<'a, Result<ValidatedToken, Error>> {
        Box::pin(async move {
            self.check_preconditions(raw)?;
            if is_jwe_form(raw) {
                let parsed = self.read_token(raw, params)?;
                let inner = decrypt_token(&parsed, params)?;
                if is_jwe_form(&inner) {
                    return Err(Error::MalformedToken(
                        "nested encrypted tokens are not supported".to_string(),
                    ));
                }
                return self.validate_async_at_depth(&inner, params, depth).await;
            }
            let (token, signing_key) = self.validate_signature_async(raw, params).await?;
            self.validate_payload_async(token, signing_key, params, depth)
                .await
        })
    }

    fn check_preconditions(&self, raw: &str) -> Result<(), Error> {
        if raw.trim().is_empty() {
            return Err(Error::InvalidArgument("token is empty".to_string()));
        }
        if raw.len() > self.reader.maximum_token_size() {
            return Err(Error::InvalidArgument(format!(
                "token length {} exceeds maximum {}",
                raw.len(),
                self.reader.maximum_token_size()
            )));
        }
        Ok(())
    }

    fn read_token(
        &self,
        raw: &str,
        params: &ValidationParameters,
    ) -> Result<CompactToken, Error> {
        match &params.token_reader {
            Some(reader) => reader(raw),
            None => self.reader.read(raw),
        }
    }

    fn validate_signature(
        &self,
        raw: &str,
        params: &ValidationParameters,
    ) -> Result<(CompactToken, Option<SecurityKey>), Error> {
        if let Some(validator) = &params.signature_validator {
            let token = validator(raw, params)?;
            if token.is_encrypted() {
                return Err(Error::InvalidSignature(
                    "signature validator returned an unexpected token shape".to_string(),
                ));
            }
            return Ok((token, None));
        }

        let token = self.read_token(raw, params)?;
        let prepared = match prepare_signature_check(&token, params)? {
            Some(prepared) => prepared,
            None => return Ok((token, None)),
        };
        let key = helpers::try_verify_with_keys(
            &prepared.candidates,
            &prepared.algorithm,
            prepared.signed_bytes.as_bytes(),
            &prepared.signature,
            token.header().kid.as_deref(),
            params.factory(),
        )?;
        Ok((token, Some(key)))
    }

    #[cfg(feature = "async-validate")]
    async fn validate_signature_async(
        &self,
        raw: &str,
        params: &ValidationParameters,
    ) -> Result<(CompactToken, Option<SecurityKey>), Error> {
        if let Some(validator) = &params.signature_validator {
            let token = validator(raw, params)?;
            if token.is_encrypted() {
                return Err(Error::InvalidSignature(
                    "signature validator returned an unexpected token shape".to_string(),
                ));
            }
            return Ok((token, None));
        }

        let token = self.read_token(raw, params)?;
        let prepared = match prepare_signature_check(&token, params)? {
            Some(prepared) => prepared,
            None => return Ok((token, None)),
        };
        let key = helpers::try_verify_with_keys_async(
            &prepared.candidates,
            &prepared.algorithm,
            prepared.signed_bytes.as_bytes(),
            &prepared.signature,
            token.header().kid.as_deref(),
            params.factory(),
        )
        .await?;
        Ok((token, Some(key)))
    }

    fn validate_payload(
        &self,
        token: CompactToken,
        signing_key: Option<SecurityKey>,
        params: &ValidationParameters,
        depth: usize,
    ) -> Result<ValidatedToken, Error> {
        helpers::validate_lifetime(&token, params)?;
        helpers::validate_audience(&token, params)?;
        let issuer = helpers::validate_issuer(&token, params)?;
        helpers::validate_token_replay(&token, params)?;
        if params.validate_actor {
            if let Some(actor) = actor_token(&token) {
                if depth + 1 >= MAX_ACTOR_DEPTH {
                    return Err(actor_depth_error());
                }
                let actor_params = params
                    .actor_validation_parameters
                    .as_deref()
                    .unwrap_or(params);
                self.validate_at_depth(&actor, actor_params, depth + 1)?;
            }
        }
        helpers::validate_issuer_security_key(signing_key.as_ref(), params)?;
        Ok(ValidatedToken {
            token,
            signing_key,
            issuer,
        })
    }

    #[cfg(feature = "async-validate")]
    async fn validate_payload_async(
        &self,
        token: CompactToken,
        signing_key: Option<SecurityKey>,
        params: &ValidationParameters,
        depth: usize,
    ) -> Result<ValidatedToken, Error> {
        helpers::validate_lifetime(&token, params)?;
        helpers::validate_audience(&token, params)?;
        let issuer = helpers::validate_issuer(&token, params)?;
        helpers::validate_token_replay(&token, params)?;
        if params.validate_actor {
            if let Some(actor) = actor_token(&token) {
                if depth + 1 >= MAX_ACTOR_DEPTH {
                    return Err(actor_depth_error());
                }
                let actor_params = params
                    .actor_validation_parameters
                    .as_deref()
                    .unwrap_or(params);
                self.validate_async_at_depth(&actor, actor_params, depth + 1)
                    .await?;
            }
        }
        helpers::validate_issuer_security_key(signing_key.as_ref(), params)?;
        Ok(ValidatedToken {
            token,
            signing_key,
            issuer,
        })
    }
}

struct PreparedSignatureCheck {
    algorithm: String,
    signed_bytes: String,
    signature: Vec<u8>,
    candidates: Vec<SecurityKey>,
}

/// Shared between the sync and async paths: unsigned-token policy, signature
/// decoding, and candidate-key resolution. `None` means the token is accepted
/// unverified (unsigned, and policy allows it).
fn prepare_signature_check(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Result<Option<PreparedSignatureCheck>, Error> {
    let (Some(payload), Some(signature_segment)) = (token.raw_payload(), token.raw_signature())
    else {
        return Err(Error::InvalidSignature(
            "signature validation requires a signed token shape".to_string(),
        ));
    };
    if signature_segment.is_empty() {
        if params.require_signed_tokens {
            return Err(Error::InvalidSignature(
                "token is unsigned and unsigned tokens are not accepted".to_string(),
            ));
        }
        return Ok(None);
    }
    let Some(algorithm) = token.header().alg.clone() else {
        return Err(Error::InvalidSignature(
            "signed token header has no alg parameter".to_string(),
        ));
    };
    let signature = base64url::decode(signature_segment)
        .map_err(|e| Error::InvalidSignature(format!("signature decode error: {e}")))?;
    let signed_bytes = format!("{}.{}", token.raw_header(), payload);

    let mut candidates = helpers::resolve_signing_keys(token, params);
    if candidates.is_empty() {
        candidates = params.all_signing_keys().cloned().collect();
    }
    Ok(Some(PreparedSignatureCheck {
        algorithm,
        signed_bytes,
        signature,
        candidates,
    }))
}

fn actor_token(token: &CompactToken) -> Option<String> {
    token
        .actor()
        .filter(|actor| !actor.is_empty())
        .map(str::to_string)
}

fn actor_depth_error() -> Error {
    Error::MalformedToken(format!("actor chain exceeds {MAX_ACTOR_DEPTH} levels"))
}

fn is_jwe_form(raw: &str) -> bool {
    raw.splitn(JWE_SEGMENT_COUNT + 1, '.').count() == JWE_SEGMENT_COUNT
}

/// Resolves a decryption key, obtains the CEK (directly or by unwrap), and
/// decrypts with the encoded header as AAD. Per-key failures accumulate so
/// remaining candidates are still tried.
fn decrypt_token(token: &CompactToken, params: &ValidationParameters) -> Result<String, Error> {
    let header = token.header();
    let Some(segments) = token.jwe_segments() else {
        return Err(Error::MalformedToken(
            "expected an encrypted token".to_string(),
        ));
    };
    let Some(enc) = header.enc.as_deref() else {
        return Err(Error::MalformedToken(
            "encrypted token header has no enc parameter".to_string(),
        ));
    };
    let Some(alg) = header.alg.as_deref() else {
        return Err(Error::MalformedToken(
            "encrypted token header has no alg parameter".to_string(),
        ));
    };
    let encrypted_key = base64url::decode(segments.encrypted_key)?;
    let iv = base64url::decode(segments.iv)?;
    let ciphertext = base64url::decode(segments.ciphertext)?;
    let tag = base64url::decode(segments.tag)?;

    let mut keys = helpers::resolve_keys_by_header(
        header,
        params.token_decryption_key.as_ref(),
        &params.token_decryption_keys,
    );
    if keys.is_empty() {
        keys = params.all_decryption_keys().cloned().collect();
    }
    if keys.is_empty() {
        return Err(Error::DecryptionFailed(
            "no decryption keys configured".to_string(),
        ));
    }

    let factory = params.factory();
    let mut attempts: Vec<String> = Vec::new();
    for key in keys {
        let mut cek = if alg == ALG_DIRECT {
            match key.symmetric_bytes() {
                Some(bytes) => bytes.to_vec(),
                None => {
                    attempts.push(format!(
                        "{}: direct decryption requires a symmetric key",
                        key.describe()
                    ));
                    continue;
                }
            }
        } else {
            let provider = match factory.create_key_wrap_provider(&key, alg) {
                Ok(provider) => provider,
                Err(err) => {
                    attempts.push(format!("{}: {err}", key.describe()));
                    continue;
                }
            };
            let unwrapped = provider.unwrap_key(&encrypted_key);
            factory.release_key_wrap_provider(provider);
            match unwrapped {
                Ok(cek) => cek,
                Err(err) => {
                    attempts.push(format!("{}: {err}", key.describe()));
                    continue;
                }
            }
        };

        let provider = match factory.create_authenticated_encryption_provider(&cek, enc) {
            Ok(provider) => provider,
            Err(err) => {
                cek.zeroize();
                attempts.push(format!("{}: {err}", key.describe()));
                continue;
            }
        };
        let result = provider.decrypt(&ciphertext, segments.header.as_bytes(), &iv, &tag);
        factory.release_encryption_provider(provider);
        cek.zeroize();
        match result {
            Ok(plaintext) => {
                return String::from_utf8(plaintext).map_err(|_| {
                    Error::DecryptionFailed("decrypted content is not valid utf-8".to_string())
                });
            }
            Err(err) => attempts.push(format!("{}: {err}", key.describe())),
        }
    }
    Err(Error::DecryptionFailed(format!(
        "no configured key decrypted the token; attempted: [{}]",
        attempts.join("; ")
    )))
}
