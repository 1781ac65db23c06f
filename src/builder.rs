use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore as _;
use serde::Serialize;
use serde_json::Value;
use zeroize::Zeroize as _;

use crate::base64url;
use crate::constants::{content_key_size, ALG_DIRECT, AEAD_ENCS, JWT_TYPE};
use crate::credentials::{EncryptingCredentials, SigningCredentials};
use crate::error::Error;
use crate::header_cache::HeaderCache;

/// Composes JWS compact tokens and wraps them into JWE when encryption is
/// requested.
///
/// Headers for a given signing credential are serialized once and reused via
/// the [`HeaderCache`]; the process-wide instance is used unless a cache is
/// injected (tests inject a fresh one).
#[derive(Default)]
pub struct TokenBuilder {
    header_cache: Option<Arc<HeaderCache>>,
}

impl TokenBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_cache(mut self, cache: Arc<HeaderCache>) -> Self {
        self.header_cache = Some(cache);
        self
    }

    /// Builds `header.payload.signature`, wrapped into a five-segment JWE
    /// when `encrypting` is present. Without signing credentials the header
    /// is the encoded empty object and the signature segment stays empty.
    pub fn build(
        &self,
        claims: &Value,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String, Error> {
        let header = self.encoded_header(signing)?;
        let payload = encode_payload(claims)?;
        let signature = match signing {
            Some(credentials) => sign(credentials, &header, &payload)?,
            None => String::new(),
        };
        self.assemble(header, payload, signature, encrypting)
    }

    /// Suspension-capable flavour; suspends only at the signing call.
    #[cfg(feature = "async-validate")]
    pub async fn build_async(
        &self,
        claims: &Value,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String, Error> {
        let header = self.encoded_header(signing)?;
        let payload = encode_payload(claims)?;
        let signature = match signing {
            Some(credentials) => sign_async(credentials, &header, &payload).await?,
            None => String::new(),
        };
        self.assemble(header, payload, signature, encrypting)
    }

    /// Testing-oriented overload: uses `encoded_header` verbatim, both as the
    /// JWS header and, when encrypting, as the JWE protected header (and thus
    /// the AAD).
    pub fn build_with_encoded_header(
        &self,
        encoded_header: &str,
        claims: &Value,
        signing: Option<&SigningCredentials>,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String, Error> {
        let payload = encode_payload(claims)?;
        let signature = match signing {
            Some(credentials) => sign(credentials, encoded_header, &payload)?,
            None => String::new(),
        };
        let jws = format!("{encoded_header}.{payload}.{signature}");
        match encrypting {
            Some(credentials) => encrypt(&jws, encoded_header, credentials),
            None => Ok(jws),
        }
    }

    fn assemble(
        &self,
        header: String,
        payload: String,
        signature: String,
        encrypting: Option<&EncryptingCredentials>,
    ) -> Result<String, Error> {
        let jws = format!("{header}.{payload}.{signature}");
        match encrypting {
            Some(credentials) => {
                let jwe_header = encoded_jwe_header(credentials)?;
                encrypt(&jws, &jwe_header, credentials)
            }
            None => Ok(jws),
        }
    }

    fn encoded_header(&self, signing: Option<&SigningCredentials>) -> Result<String, Error> {
        let Some(credentials) = signing else {
            return Ok(base64url::encode("{}"));
        };
        let cache = self.cache();
        let entry = cache.get_or_insert_with(&credentials.fingerprint(), || {
            serialize_header(&ProtectedHeader {
                alg: credentials.algorithm(),
                enc: None,
                kid: credentials.key().key_id(),
                typ: JWT_TYPE,
            })
        })?;
        Ok(entry.to_string())
    }

    fn cache(&self) -> &HeaderCache {
        match &self.header_cache {
            Some(cache) => cache,
            None => HeaderCache::shared(),
        }
    }
}

fn encode_payload(claims: &Value) -> Result<String, Error> {
    if !claims.is_object() {
        return Err(Error::InvalidArgument(
            "claims must be a JSON object".to_string(),
        ));
    }
    let json = serde_json::to_string(claims)
        .map_err(|e| Error::InvalidArgument(format!("claims serialization error: {e}")))?;
    Ok(base64url::encode(json))
}

/// Compact protected header; serialized in declaration order.
#[derive(Serialize)]
struct ProtectedHeader<'a> {
    alg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    enc: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
    typ: &'a str,
}

fn serialize_header(header: &ProtectedHeader<'_>) -> Result<String, Error> {
    let json = serde_json::to_string(header)
        .map_err(|e| Error::InvalidArgument(format!("header serialization error: {e}")))?;
    Ok(base64url::encode(json))
}

fn sign(
    credentials: &SigningCredentials,
    header: &str,
    payload: &str,
) -> Result<String, Error> {
    let factory = credentials.factory();
    let provider = factory.create_signing_provider(credentials.key(), credentials.algorithm())?;
    let signing_input = format!("{header}.{payload}");
    let signature = provider.sign(signing_input.as_bytes());
    factory.release_signature_provider(provider);
    Ok(base64url::encode(signature?))
}

#[cfg(feature = "async-validate")]
async fn sign_async(
    credentials: &SigningCredentials,
    header: &str,
    payload: &str,
) -> Result<String, Error> {
    let factory = credentials.factory();
    let provider = factory.create_signing_provider(credentials.key(), credentials.algorithm())?;
    let signing_input = format!("{header}.{payload}");
    let signature = provider.sign_async(signing_input.as_bytes()).await;
    factory.release_signature_provider(provider);
    Ok(base64url::encode(signature?))
}

fn encoded_jwe_header(credentials: &EncryptingCredentials) -> Result<String, Error> {
    serialize_header(&ProtectedHeader {
        alg: credentials.alg(),
        enc: Some(credentials.enc()),
        kid: credentials.key().key_id(),
        typ: JWT_TYPE,
    })
}

/// Wraps an inner JWS into the five-segment JWE compact form; `aad` is the
/// ASCII of the encoded protected header.
fn encrypt(
    inner_jws: &str,
    encoded_header: &str,
    credentials: &EncryptingCredentials,
) -> Result<String, Error> {
    if credentials.alg() == ALG_DIRECT {
        encrypt_direct(inner_jws, encoded_header, credentials)
    } else {
        encrypt_with_key_wrap(inner_jws, encoded_header, credentials)
    }
}

fn encrypt_direct(
    inner_jws: &str,
    encoded_header: &str,
    credentials: &EncryptingCredentials,
) -> Result<String, Error> {
    let factory = credentials.factory();
    if !factory.is_supported_algorithm(credentials.enc(), credentials.key()) {
        return Err(Error::EncryptionFailed(format!(
            "direct encryption with {} is not supported for key {}",
            credentials.enc(),
            credentials.key().describe()
        )));
    }
    let Some(cek) = credentials.key().symmetric_bytes() else {
        return Err(Error::EncryptionFailed(
            "direct encryption requires a symmetric key".to_string(),
        ));
    };
    let provider = factory
        .create_authenticated_encryption_provider(cek, credentials.enc())
        .map_err(as_encryption_error)?;
    let result = provider.encrypt(inner_jws.as_bytes(), encoded_header.as_bytes());
    factory.release_encryption_provider(provider);
    let sealed = result.map_err(as_encryption_error)?;
    Ok(format!(
        "{encoded_header}..{}.{}.{}",
        base64url::encode(&sealed.iv),
        base64url::encode(&sealed.ciphertext),
        base64url::encode(&sealed.tag)
    ))
}

fn encrypt_with_key_wrap(
    inner_jws: &str,
    encoded_header: &str,
    credentials: &EncryptingCredentials,
) -> Result<String, Error> {
    let factory = credentials.factory();
    if !factory.is_supported_algorithm(credentials.alg(), credentials.key()) {
        return Err(Error::EncryptionFailed(format!(
            "key wrap with {} is not supported for key {}",
            credentials.alg(),
            credentials.key().describe()
        )));
    }
    let Some(cek_size) = content_key_size(credentials.enc()) else {
        return Err(Error::EncryptionFailed(format!(
            "unsupported content encryption algorithm {}; accepted: {}",
            credentials.enc(),
            AEAD_ENCS.join(", ")
        )));
    };

    let mut cek = vec![0u8; cek_size];
    OsRng.fill_bytes(&mut cek);

    let wrap_provider = match factory.create_key_wrap_provider(credentials.key(), credentials.alg())
    {
        Ok(provider) => provider,
        Err(err) => {
            cek.zeroize();
            return Err(as_encryption_error(err));
        }
    };
    let wrapped = wrap_provider.wrap_key(&cek);
    factory.release_key_wrap_provider(wrap_provider);

    let sealed = wrapped.map_err(as_encryption_error).and_then(|wrapped| {
        let provider = factory
            .create_authenticated_encryption_provider(&cek, credentials.enc())
            .map_err(as_encryption_error)?;
        let result = provider.encrypt(inner_jws.as_bytes(), encoded_header.as_bytes());
        factory.release_encryption_provider(provider);
        Ok((wrapped, result.map_err(as_encryption_error)?))
    });
    cek.zeroize();
    let (wrapped, sealed) = sealed?;

    Ok(format!(
        "{encoded_header}.{}.{}.{}.{}",
        base64url::encode(&wrapped),
        base64url::encode(&sealed.iv),
        base64url::encode(&sealed.ciphertext),
        base64url::encode(&sealed.tag)
    ))
}

/// Provider faults surface as `EncryptionFailed` with the original cause.
fn as_encryption_error(err: Error) -> Error {
    match err {
        err @ Error::EncryptionFailed(_) => err,
        other => Error::EncryptionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::TokenBuilder;
    use crate::credentials::SigningCredentials;
    use crate::header_cache::HeaderCache;
    use crate::keys::SecurityKey;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn unsigned_token_has_empty_header_object_and_signature() {
        let builder = TokenBuilder::new().with_header_cache(Arc::new(HeaderCache::new()));
        let token = builder
            .build(&json!({"sub": "a"}), None, None)
            .expect("build");
        assert_eq!(token, "e30.eyJzdWIiOiJhIn0.");
    }

    #[test]
    fn signed_headers_are_byte_identical_across_builds() {
        let cache = Arc::new(HeaderCache::new());
        let builder = TokenBuilder::new().with_header_cache(Arc::clone(&cache));
        let credentials =
            SigningCredentials::new(SecurityKey::symmetric(vec![1u8; 32]).with_key_id("k1"), "HS256");
        let first = builder
            .build(&json!({"n": 1}), Some(&credentials), None)
            .expect("build");
        let second = builder
            .build(&json!({"n": 2}), Some(&credentials), None)
            .expect("build");
        let first_header = first.split('.').next().expect("segment");
        let second_header = second.split('.').next().expect("segment");
        assert_eq!(first_header, second_header);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn non_object_claims_are_rejected() {
        let builder = TokenBuilder::new().with_header_cache(Arc::new(HeaderCache::new()));
        assert!(builder.build(&json!("scalar"), None, None).is_err());
    }
}
