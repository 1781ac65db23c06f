use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::base64url;
use crate::constants::{
    DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES, JWE_SEGMENT_COUNT, JWS_SEGMENT_COUNT,
};
use crate::error::Error;
use crate::token::{CompactToken, JwtHeader, TokenBody};

static JWS_PATTERN: OnceLock<Regex> = OnceLock::new();
static JWE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn jws_pattern() -> &'static Regex {
    JWS_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").expect("jws pattern")
    })
}

fn jwe_pattern() -> &'static Regex {
    JWE_PATTERN.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$",
        )
        .expect("jwe pattern")
    })
}

/// Parses compact serializations into [`CompactToken`] values.
///
/// Size rule: `can_read` rejects when `len * 2` exceeds the maximum (a
/// UTF-16 worst-case count, for parity with handlers that measure tokens in
/// two-byte units), while `read` compares the byte length directly.
#[derive(Debug, Clone)]
pub struct TokenReader {
    maximum_token_size_in_bytes: usize,
}

impl Default for TokenReader {
    fn default() -> Self {
        Self {
            maximum_token_size_in_bytes: DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES,
        }
    }
}

impl TokenReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_maximum_token_size(mut self, bytes: usize) -> Self {
        self.maximum_token_size_in_bytes = bytes;
        self
    }

    pub fn maximum_token_size(&self) -> usize {
        self.maximum_token_size_in_bytes
    }

    /// Cheap structural check: segment count and alphabet only, no decoding.
    pub fn can_read(&self, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        if token.len() * 2 > self.maximum_token_size_in_bytes {
            return false;
        }
        // One extra split slot so an oversegmented token is detectable.
        let segments: Vec<&str> = token.splitn(JWE_SEGMENT_COUNT + 1, '.').collect();
        match segments.len() {
            JWS_SEGMENT_COUNT => jws_pattern().is_match(token),
            JWE_SEGMENT_COUNT => jwe_pattern().is_match(token),
            _ => false,
        }
    }

    /// Parses without any signature verification or decryption.
    pub fn read(&self, token: &str) -> Result<CompactToken, Error> {
        if token.trim().is_empty() {
            return Err(Error::InvalidArgument("token is empty".to_string()));
        }
        if token.len() > self.maximum_token_size_in_bytes {
            return Err(Error::InvalidArgument(format!(
                "token length {} exceeds maximum {}",
                token.len(),
                self.maximum_token_size_in_bytes
            )));
        }

        let segments: Vec<&str> = token.splitn(JWE_SEGMENT_COUNT + 1, '.').collect();
        match segments.len() {
            JWS_SEGMENT_COUNT => {
                let header = decode_header(segments[0])?;
                let claims = decode_claims(segments[1])?;
                Ok(CompactToken::new(
                    token.to_string(),
                    header,
                    TokenBody::Jws {
                        header: segments[0].to_string(),
                        payload: segments[1].to_string(),
                        signature: segments[2].to_string(),
                        claims,
                    },
                ))
            }
            JWE_SEGMENT_COUNT => {
                let header = decode_header(segments[0])?;
                Ok(CompactToken::new(
                    token.to_string(),
                    header,
                    TokenBody::Jwe {
                        header: segments[0].to_string(),
                        encrypted_key: segments[1].to_string(),
                        iv: segments[2].to_string(),
                        ciphertext: segments[3].to_string(),
                        tag: segments[4].to_string(),
                    },
                ))
            }
            count => Err(Error::MalformedToken(format!(
                "expected {JWS_SEGMENT_COUNT} or {JWE_SEGMENT_COUNT} dot-separated segments, found {count}"
            ))),
        }
    }
}

fn decode_header(encoded: &str) -> Result<JwtHeader, Error> {
    let bytes = base64url::decode(encoded)?;
    let raw: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("header json error: {e}")))?;
    JwtHeader::from_value(raw)
}

fn decode_claims(encoded: &str) -> Result<Value, Error> {
    let bytes = base64url::decode(encoded)?;
    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload json error: {e}")))?;
    if !claims.is_object() {
        return Err(Error::MalformedToken(
            "payload is not a JSON object".to_string(),
        ));
    }
    Ok(claims)
}
