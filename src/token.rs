use serde_json::Value;

use crate::constants::{
    CLAIM_ACTOR, CLAIM_AUDIENCE, CLAIM_EXPIRATION, CLAIM_ISSUED_AT, CLAIM_ISSUER, CLAIM_NOT_BEFORE,
    HEADER_ALG, HEADER_ENC, HEADER_KID, HEADER_TYP, HEADER_X5T,
};
use crate::error::Error;

/// Decoded protected header of a compact token.
#[derive(Debug, Clone)]
pub struct JwtHeader {
    pub alg: Option<String>,
    pub enc: Option<String>,
    pub kid: Option<String>,
    pub x5t: Option<String>,
    pub typ: Option<String>,
    pub raw: Value,
}

impl JwtHeader {
    pub(crate) fn from_value(raw: Value) -> Result<Self, Error> {
        if !raw.is_object() {
            return Err(Error::MalformedToken(
                "protected header is not a JSON object".to_string(),
            ));
        }
        Ok(Self {
            alg: string_param(&raw, HEADER_ALG)?,
            enc: string_param(&raw, HEADER_ENC)?,
            kid: string_param(&raw, HEADER_KID)?,
            x5t: string_param(&raw, HEADER_X5T)?,
            typ: string_param(&raw, HEADER_TYP)?,
            raw,
        })
    }
}

fn string_param(raw: &Value, name: &str) -> Result<Option<String>, Error> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(Error::MalformedToken(format!(
            "header parameter {name} is not a string"
        ))),
    }
}

/// A parsed compact token: three segments for JWS, five for JWE.
///
/// For a JWS the claims are decoded eagerly; for a JWE only the header and
/// raw segments are available until the validator decrypts the content.
#[derive(Debug, Clone)]
pub struct CompactToken {
    raw: String,
    header: JwtHeader,
    body: TokenBody,
}

#[derive(Debug, Clone)]
pub(crate) enum TokenBody {
    Jws {
        header: String,
        payload: String,
        signature: String,
        claims: Value,
    },
    Jwe {
        header: String,
        encrypted_key: String,
        iv: String,
        ciphertext: String,
        tag: String,
    },
}

impl CompactToken {
    pub(crate) fn new(raw: String, header: JwtHeader, body: TokenBody) -> Self {
        Self { raw, header, body }
    }

    /// The original compact serialization.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.body, TokenBody::Jwe { .. })
    }

    /// Claim set; `None` until an encrypted token has been decrypted.
    pub fn claims(&self) -> Option<&Value> {
        match &self.body {
            TokenBody::Jws { claims, .. } => Some(claims),
            TokenBody::Jwe { .. } => None,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claims()?.get(CLAIM_ISSUER)?.as_str()
    }

    /// `aud` values; a single string claim yields one entry.
    pub fn audiences(&self) -> Vec<&str> {
        let Some(aud) = self.claims().and_then(|c| c.get(CLAIM_AUDIENCE)) else {
            return Vec::new();
        };
        match aud {
            Value::String(value) => vec![value.as_str()],
            Value::Array(values) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// `exp` as seconds since the epoch.
    pub fn expires_at(&self) -> Option<i64> {
        self.numeric_date(CLAIM_EXPIRATION)
    }

    /// `nbf` as seconds since the epoch.
    pub fn not_before(&self) -> Option<i64> {
        self.numeric_date(CLAIM_NOT_BEFORE)
    }

    /// `iat` as seconds since the epoch.
    pub fn issued_at(&self) -> Option<i64> {
        self.numeric_date(CLAIM_ISSUED_AT)
    }

    /// The `act` claim: a nested compact token identifying the acting party.
    pub fn actor(&self) -> Option<&str> {
        self.claims()?.get(CLAIM_ACTOR)?.as_str()
    }

    fn numeric_date(&self, name: &str) -> Option<i64> {
        let value = self.claims()?.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|v| v.round() as i64))
    }

    pub(crate) fn raw_header(&self) -> &str {
        match &self.body {
            TokenBody::Jws { header, .. } => header,
            TokenBody::Jwe { header, .. } => header,
        }
    }

    pub(crate) fn raw_payload(&self) -> Option<&str> {
        match &self.body {
            TokenBody::Jws { payload, .. } => Some(payload),
            TokenBody::Jwe { .. } => None,
        }
    }

    pub(crate) fn raw_signature(&self) -> Option<&str> {
        match &self.body {
            TokenBody::Jws { signature, .. } => Some(signature),
            TokenBody::Jwe { .. } => None,
        }
    }

    pub(crate) fn jwe_segments(&self) -> Option<JweSegments<'_>> {
        match &self.body {
            TokenBody::Jwe {
                header,
                encrypted_key,
                iv,
                ciphertext,
                tag,
            } => Some(JweSegments {
                header,
                encrypted_key,
                iv,
                ciphertext,
                tag,
            }),
            TokenBody::Jws { .. } => None,
        }
    }
}

pub(crate) struct JweSegments<'a> {
    pub(crate) header: &'a str,
    pub(crate) encrypted_key: &'a str,
    pub(crate) iv: &'a str,
    pub(crate) ciphertext: &'a str,
    pub(crate) tag: &'a str,
}
