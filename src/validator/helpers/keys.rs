use log::warn;

use crate::crypto::CryptoProviderFactory;
use crate::error::Error;
use crate::keys::SecurityKey;
use crate::token::{CompactToken, JwtHeader};
use crate::validator::params::ValidationParameters;

/// Built-in key resolution, first match wins: `kid` against the primary key
/// then the list; `x5t` against the primary key id, the primary certificate
/// thumbprint, then the list. An empty result means the caller falls back to
/// trying every configured key.
pub(in crate::validator) fn resolve_signing_keys(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Vec<SecurityKey> {
    if let Some(resolver) = &params.issuer_signing_key_resolver {
        return resolver(token, params);
    }
    resolve_keys_by_header(
        token.header(),
        params.issuer_signing_key.as_ref(),
        &params.issuer_signing_keys,
    )
}

pub(in crate::validator) fn resolve_keys_by_header(
    header: &JwtHeader,
    primary: Option<&SecurityKey>,
    others: &[SecurityKey],
) -> Vec<SecurityKey> {
    if let Some(kid) = header.kid.as_deref() {
        if let Some(key) = primary.filter(|k| k.key_id() == Some(kid)) {
            return vec![key.clone()];
        }
        if let Some(key) = others.iter().find(|k| k.key_id() == Some(kid)) {
            return vec![key.clone()];
        }
    } else if let Some(x5t) = header.x5t.as_deref() {
        if let Some(key) = primary {
            if key.key_id() == Some(x5t) || key.thumbprint() == Some(x5t) {
                return vec![key.clone()];
            }
        }
        if let Some(key) = others.iter().find(|k| k.key_id() == Some(x5t)) {
            return vec![key.clone()];
        }
    }
    Vec::new()
}

/// Outcome of trying one candidate key. Faults are accumulated, never
/// propagated, so the remaining candidates still get their turn.
enum KeyTrialOutcome {
    Mismatch,
    Unsupported(String),
    ProviderFault(String),
}

/// Tries every candidate key at most once and returns the first that
/// verifies. The terminal error is computed from the accumulated outcomes
/// plus whether any attempted key matched the token `kid`.
pub(in crate::validator) fn try_verify_with_keys(
    candidates: &[SecurityKey],
    algorithm: &str,
    signed_bytes: &[u8],
    signature: &[u8],
    kid: Option<&str>,
    factory: &dyn CryptoProviderFactory,
) -> Result<SecurityKey, Error> {
    let mut attempts: Vec<String> = Vec::new();
    let mut key_matched = false;

    for key in candidates {
        key_matched |= kid.is_some() && key.key_id() == kid;
        let outcome = match factory.create_verifying_provider(key, algorithm) {
            Ok(provider) => {
                let verified = provider.verify(signed_bytes, signature);
                factory.release_signature_provider(provider);
                match verified {
                    Ok(true) => return Ok(key.clone()),
                    Ok(false) => KeyTrialOutcome::Mismatch,
                    Err(err) => KeyTrialOutcome::ProviderFault(err.to_string()),
                }
            }
            Err(err) => KeyTrialOutcome::Unsupported(err.to_string()),
        };
        attempts.push(describe_attempt(key, &outcome));
    }

    Err(trial_error(&attempts, kid, key_matched))
}

#[cfg(feature = "async-validate")]
pub(in crate::validator) async fn try_verify_with_keys_async(
    candidates: &[SecurityKey],
    algorithm: &str,
    signed_bytes: &[u8],
    signature: &[u8],
    kid: Option<&str>,
    factory: &dyn CryptoProviderFactory,
) -> Result<SecurityKey, Error> {
    let mut attempts: Vec<String> = Vec::new();
    let mut key_matched = false;

    for key in candidates {
        key_matched |= kid.is_some() && key.key_id() == kid;
        let outcome = match factory.create_verifying_provider(key, algorithm) {
            Ok(provider) => {
                let verified = provider.verify_async(signed_bytes, signature).await;
                factory.release_signature_provider(provider);
                match verified {
                    Ok(true) => return Ok(key.clone()),
                    Ok(false) => KeyTrialOutcome::Mismatch,
                    Err(err) => KeyTrialOutcome::ProviderFault(err.to_string()),
                }
            }
            Err(err) => KeyTrialOutcome::Unsupported(err.to_string()),
        };
        attempts.push(describe_attempt(key, &outcome));
    }

    Err(trial_error(&attempts, kid, key_matched))
}

fn describe_attempt(key: &SecurityKey, outcome: &KeyTrialOutcome) -> String {
    match outcome {
        KeyTrialOutcome::Mismatch => format!("{}: signature mismatch", key.describe()),
        KeyTrialOutcome::Unsupported(msg) => format!("{}: {msg}", key.describe()),
        KeyTrialOutcome::ProviderFault(msg) => format!("{}: {msg}", key.describe()),
    }
}

fn trial_error(attempts: &[String], kid: Option<&str>, key_matched: bool) -> Error {
    if let Some(kid) = kid {
        if !key_matched {
            return Error::SignatureKeyNotFound(kid.to_string());
        }
    }
    if attempts.is_empty() {
        return Error::InvalidSignature("no signing keys configured".to_string());
    }
    warn!(
        "signature verification failed after trying {} key(s)",
        attempts.len()
    );
    Error::InvalidSignature(format!(
        "no configured key verified the signature; attempted: [{}]",
        attempts.join("; ")
    ))
}
