use log::warn;

use crate::constants::unix_time_now;
use crate::error::Error;
use crate::keys::SecurityKey;
use crate::token::CompactToken;
use crate::validator::params::ValidationParameters;

/// `nbf`/`exp` against the clock with the configured skew; absent claims are
/// accepted.
pub(in crate::validator) fn validate_lifetime(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Result<(), Error> {
    let skew = params.clock_skew.as_secs() as i64;
    let now = unix_time_now();
    let not_before = token.not_before();
    let expires = token.expires_at();

    if let (Some(not_before), Some(expires)) = (not_before, expires) {
        if not_before > expires {
            return Err(Error::InvalidLifetime(format!(
                "nbf {not_before} is after exp {expires}"
            )));
        }
    }
    if let Some(not_before) = not_before {
        if not_before > now + skew {
            return Err(Error::InvalidLifetime(format!(
                "token is not valid before {not_before} (now {now}, skew {skew}s)"
            )));
        }
    }
    if let Some(expires) = expires {
        if expires < now - skew {
            return Err(Error::InvalidLifetime(format!(
                "token expired at {expires} (now {now}, skew {skew}s)"
            )));
        }
    }
    Ok(())
}

/// `aud` must overlap `valid_audiences`; an empty configuration skips the
/// check.
pub(in crate::validator) fn validate_audience(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Result<(), Error> {
    if params.valid_audiences.is_empty() {
        return Ok(());
    }
    let audiences = token.audiences();
    let matched = audiences
        .iter()
        .any(|aud| params.valid_audiences.iter().any(|valid| valid == aud));
    if matched {
        return Ok(());
    }
    Err(Error::InvalidAudience(format!(
        "token audiences [{}] do not overlap the accepted list",
        audiences.join(", ")
    )))
}

/// Returns the validated issuer. An empty configuration accepts and echoes
/// whatever the token carries.
pub(in crate::validator) fn validate_issuer(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Result<Option<String>, Error> {
    let issuer = token.issuer();
    if params.valid_issuers.is_empty() {
        return Ok(issuer.map(str::to_string));
    }
    match issuer {
        Some(issuer) if params.valid_issuers.iter().any(|valid| valid == issuer) => {
            Ok(Some(issuer.to_string()))
        }
        Some(issuer) => Err(Error::InvalidIssuer(format!(
            "issuer {issuer} is not in the accepted list"
        ))),
        None => Err(Error::InvalidIssuer("token has no iss claim".to_string())),
    }
}

/// Consults the replay cache when configured. Replay detection needs an
/// expiry to bound the cache entry; a token without one is rejected.
pub(in crate::validator) fn validate_token_replay(
    token: &CompactToken,
    params: &ValidationParameters,
) -> Result<(), Error> {
    let Some(cache) = &params.token_replay_cache else {
        return Ok(());
    };
    let Some(expires) = token.expires_at() else {
        return Err(Error::TokenReplay(
            "replay detection requires an exp claim".to_string(),
        ));
    };
    if cache.contains(token.raw())? {
        warn!("rejecting replayed token");
        return Err(Error::TokenReplay(
            "token was presented before".to_string(),
        ));
    }
    if !cache.try_add(token.raw(), expires)? {
        return Err(Error::TokenReplay(
            "token could not be recorded in the replay cache".to_string(),
        ));
    }
    Ok(())
}

/// Issuer-key binding: the key that verified the signature must be one of
/// the configured keys. Skipped when disabled or when no signing key was
/// recorded (a signature-validator override reports none).
pub(in crate::validator) fn validate_issuer_security_key(
    signing_key: Option<&SecurityKey>,
    params: &ValidationParameters,
) -> Result<(), Error> {
    if !params.validate_issuer_signing_key {
        return Ok(());
    }
    let Some(key) = signing_key else {
        return Ok(());
    };
    let fingerprint = key.fingerprint();
    if params
        .all_signing_keys()
        .any(|candidate| candidate.fingerprint() == fingerprint)
    {
        return Ok(());
    }
    Err(Error::InvalidSigningKey(format!(
        "{} is not bound to the configured issuer keys",
        key.describe()
    )))
}
