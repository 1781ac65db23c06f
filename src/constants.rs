use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `typ` value written into every header this crate produces.
pub const JWT_TYPE: &str = "JWT";

/// Default bound on token length accepted by the reader and validator.
pub const DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES: usize = 256_000;

/// Default leeway applied to `exp` and `nbf` comparisons.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

pub(crate) const JWS_SEGMENT_COUNT: usize = 3;
pub(crate) const JWE_SEGMENT_COUNT: usize = 5;

pub(crate) const HEADER_ALG: &str = "alg";
pub(crate) const HEADER_ENC: &str = "enc";
pub(crate) const HEADER_KID: &str = "kid";
pub(crate) const HEADER_X5T: &str = "x5t";
pub(crate) const HEADER_TYP: &str = "typ";

pub(crate) const CLAIM_ISSUER: &str = "iss";
pub(crate) const CLAIM_AUDIENCE: &str = "aud";
pub(crate) const CLAIM_EXPIRATION: &str = "exp";
pub(crate) const CLAIM_NOT_BEFORE: &str = "nbf";
pub(crate) const CLAIM_ISSUED_AT: &str = "iat";
pub(crate) const CLAIM_ACTOR: &str = "act";

pub(crate) const ALG_DIRECT: &str = "dir";

pub(crate) const HMAC_ALGS: &[&str] = &["HS256", "HS384", "HS512"];
pub(crate) const RSA_ALGS: &[&str] = &["RS256", "RS384", "RS512"];
pub(crate) const ECDSA_ALGS: &[&str] = &["ES256", "ES384", "ES512"];
pub(crate) const KEY_WRAP_ALGS: &[&str] = &["A128KW", "A192KW", "A256KW"];
pub(crate) const AEAD_ENCS: &[&str] = &["A128CBC-HS256", "A192CBC-HS384", "A256CBC-HS512"];

// Safety bound on actor-token nesting; `act` claims may themselves carry an
// `act` claim, and the chain is validated recursively.
pub(crate) const MAX_ACTOR_DEPTH: usize = 10;

/// CEK byte length dictated by the content-encryption algorithm.
pub(crate) fn content_key_size(enc: &str) -> Option<usize> {
    match enc {
        "A128CBC-HS256" => Some(32),
        "A192CBC-HS384" => Some(48),
        "A256CBC-HS512" => Some(64),
        _ => None,
    }
}

pub(crate) fn unix_time_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
