use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::Error;

/// Encodes bytes as base64url without padding (RFC 7515 §2).
pub(crate) fn encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub(crate) fn decode(data: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|err| Error::MalformedToken(format!("base64url decode error: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};

    #[test]
    fn base64url_encode_is_unpadded() {
        assert_eq!(encode("{}"), "e30");
        assert_eq!(encode([0xfb, 0xff]), "-_8");
    }

    #[test]
    fn base64url_decode_rejects_standard_alphabet() {
        assert!(decode("+/==").is_err());
    }
}
