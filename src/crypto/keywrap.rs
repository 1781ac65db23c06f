use aes_kw::{KekAes128, KekAes192, KekAes256};

use crate::constants::KEY_WRAP_ALGS;
use crate::error::Error;

/// Wraps and unwraps content-encryption keys (RFC 3394 AES Key Wrap).
pub trait KeyWrapProvider: Send + Sync {
    fn algorithm(&self) -> &str;

    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, Error>;

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, Error>;
}

pub(crate) struct AesKeyWrapProvider {
    algorithm: String,
    kek: Kek,
}

enum Kek {
    Aes128(KekAes128),
    Aes192(KekAes192),
    Aes256(KekAes256),
}

impl AesKeyWrapProvider {
    pub(crate) fn new(kek: &[u8], algorithm: &str) -> Result<Self, Error> {
        let kek = match (algorithm, kek.len()) {
            ("A128KW", 16) => {
                let mut key = [0u8; 16];
                key.copy_from_slice(kek);
                Kek::Aes128(KekAes128::from(key))
            }
            ("A192KW", 24) => {
                let mut key = [0u8; 24];
                key.copy_from_slice(kek);
                Kek::Aes192(KekAes192::from(key))
            }
            ("A256KW", 32) => {
                let mut key = [0u8; 32];
                key.copy_from_slice(kek);
                Kek::Aes256(KekAes256::from(key))
            }
            (alg, len) if KEY_WRAP_ALGS.contains(&alg) => {
                return Err(Error::EncryptionFailed(format!(
                    "{alg} requires a matching kek size, got {} bits",
                    len * 8
                )))
            }
            (alg, _) => {
                return Err(Error::EncryptionFailed(format!(
                    "unsupported key wrap algorithm {alg}; accepted: {}",
                    KEY_WRAP_ALGS.join(", ")
                )))
            }
        };
        Ok(Self {
            algorithm: algorithm.to_string(),
            kek,
        })
    }
}

impl KeyWrapProvider for AesKeyWrapProvider {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        let wrapped = match &self.kek {
            Kek::Aes128(kek) => kek.wrap_vec(key),
            Kek::Aes192(kek) => kek.wrap_vec(key),
            Kek::Aes256(kek) => kek.wrap_vec(key),
        };
        wrapped.map_err(|e| Error::EncryptionFailed(format!("key wrap error: {e}")))
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, Error> {
        let key = match &self.kek {
            Kek::Aes128(kek) => kek.unwrap_vec(wrapped),
            Kek::Aes192(kek) => kek.unwrap_vec(wrapped),
            Kek::Aes256(kek) => kek.unwrap_vec(wrapped),
        };
        key.map_err(|e| Error::DecryptionFailed(format!("key unwrap error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{AesKeyWrapProvider, KeyWrapProvider};

    #[test]
    fn wrap_unwrap_round_trip() {
        let provider = AesKeyWrapProvider::new(&[5u8; 16], "A128KW").expect("provider");
        let cek = [0xabu8; 32];
        let wrapped = provider.wrap_key(&cek).expect("wrap");
        // RFC 3394: wrapped output is the input plus one 8-byte block.
        assert_eq!(wrapped.len(), 40);
        assert_eq!(provider.unwrap_key(&wrapped).expect("unwrap"), cek);
    }

    #[test]
    fn unwrap_rejects_corrupted_block() {
        let provider = AesKeyWrapProvider::new(&[5u8; 32], "A256KW").expect("provider");
        let mut wrapped = provider.wrap_key(&[1u8; 32]).expect("wrap");
        wrapped[3] ^= 0x40;
        assert!(provider.unwrap_key(&wrapped).is_err());
    }

    #[test]
    fn kek_size_must_match_algorithm() {
        assert!(AesKeyWrapProvider::new(&[0u8; 16], "A256KW").is_err());
        assert!(AesKeyWrapProvider::new(&[0u8; 16], "RSA-OAEP").is_err());
    }
}
