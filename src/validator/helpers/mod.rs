mod claims;
mod keys;

pub(in crate::validator) use claims::{
    validate_audience, validate_issuer, validate_issuer_security_key, validate_lifetime,
    validate_token_replay,
};
#[cfg(feature = "async-validate")]
pub(in crate::validator) use keys::try_verify_with_keys_async;
pub(in crate::validator) use keys::{
    resolve_keys_by_header, resolve_signing_keys, try_verify_with_keys,
};
