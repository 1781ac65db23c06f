use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut as _, BlockEncryptMut as _, KeyIvInit as _};
use hmac::{Hmac, Mac as _};
use rand::rngs::OsRng;
use rand::RngCore as _;
use sha2::{Sha256, Sha384, Sha512};

use crate::constants::{content_key_size, AEAD_ENCS};
use crate::error::Error;

const IV_SIZE: usize = 16;

pub struct EncryptionResult {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// AEAD over the JWE content: encrypt returns iv/ciphertext/tag, decrypt
/// authenticates before unpadding.
pub trait AuthenticatedEncryptionProvider: Send + Sync {
    fn algorithm(&self) -> &str;

    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<EncryptionResult, Error>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error>;
}

/// AES-CBC with HMAC-SHA2 composition (RFC 7518 §5.2).
///
/// The content key splits in half: the first half keys the MAC, the second
/// half keys the cipher. The tag is the left half of
/// `HMAC(mac_key, aad || iv || ciphertext || bitlen64(aad))`.
pub(crate) struct AesCbcHmacProvider {
    algorithm: String,
    mac_key: Vec<u8>,
    enc_key: Vec<u8>,
}

impl AesCbcHmacProvider {
    pub(crate) fn new(key: &[u8], algorithm: &str) -> Result<Self, Error> {
        let Some(size) = content_key_size(algorithm) else {
            return Err(Error::EncryptionFailed(format!(
                "unsupported content encryption algorithm {algorithm}; accepted: {}",
                AEAD_ENCS.join(", ")
            )));
        };
        if key.len() != size {
            return Err(Error::EncryptionFailed(format!(
                "{algorithm} requires a {}-bit key, got {} bits",
                size * 8,
                key.len() * 8
            )));
        }
        let (mac_key, enc_key) = key.split_at(size / 2);
        Ok(Self {
            algorithm: algorithm.to_string(),
            mac_key: mac_key.to_vec(),
            enc_key: enc_key.to_vec(),
        })
    }

    fn compute_tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        let al = ((aad.len() as u64) * 8).to_be_bytes();
        macro_rules! tag {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(&self.mac_key)
                    .map_err(|e| Error::EncryptionFailed(format!("mac key error: {e}")))?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                let full = mac.finalize().into_bytes();
                Ok(full[..self.mac_key.len()].to_vec())
            }};
        }
        match self.algorithm.as_str() {
            "A128CBC-HS256" => tag!(Sha256),
            "A192CBC-HS384" => tag!(Sha384),
            "A256CBC-HS512" => tag!(Sha512),
            other => Err(Error::EncryptionFailed(format!(
                "unsupported content encryption algorithm {other}"
            ))),
        }
    }
}

impl AuthenticatedEncryptionProvider for AesCbcHmacProvider {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<EncryptionResult, Error> {
        let mut iv = vec![0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        macro_rules! cbc_encrypt {
            ($cipher:ty) => {
                cbc::Encryptor::<$cipher>::new_from_slices(&self.enc_key, &iv)
                    .map_err(|e| Error::EncryptionFailed(format!("cipher init error: {e}")))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
            };
        }
        let ciphertext = match self.enc_key.len() {
            16 => cbc_encrypt!(aes::Aes128),
            24 => cbc_encrypt!(aes::Aes192),
            _ => cbc_encrypt!(aes::Aes256),
        };

        let tag = self.compute_tag(aad, &iv, &ciphertext)?;
        Ok(EncryptionResult {
            iv,
            ciphertext,
            tag,
        })
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if iv.len() != IV_SIZE {
            return Err(Error::DecryptionFailed(format!(
                "iv must be {IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        if tag.len() != self.mac_key.len() {
            return Err(Error::DecryptionFailed(
                "authentication tag length mismatch".to_string(),
            ));
        }
        let al = ((aad.len() as u64) * 8).to_be_bytes();
        macro_rules! check_tag {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(&self.mac_key)
                    .map_err(|e| Error::DecryptionFailed(format!("mac key error: {e}")))?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&al);
                mac.verify_truncated_left(tag).map_err(|_| {
                    Error::DecryptionFailed("authentication tag mismatch".to_string())
                })?;
            }};
        }
        match self.algorithm.as_str() {
            "A128CBC-HS256" => check_tag!(Sha256),
            "A192CBC-HS384" => check_tag!(Sha384),
            "A256CBC-HS512" => check_tag!(Sha512),
            other => {
                return Err(Error::DecryptionFailed(format!(
                    "unsupported content encryption algorithm {other}"
                )))
            }
        }

        macro_rules! cbc_decrypt {
            ($cipher:ty) => {
                cbc::Decryptor::<$cipher>::new_from_slices(&self.enc_key, iv)
                    .map_err(|e| Error::DecryptionFailed(format!("cipher init error: {e}")))?
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| Error::DecryptionFailed("invalid padding".to_string()))?
            };
        }
        let plaintext = match self.enc_key.len() {
            16 => cbc_decrypt!(aes::Aes128),
            24 => cbc_decrypt!(aes::Aes192),
            _ => cbc_decrypt!(aes::Aes256),
        };
        Ok(plaintext)
    }
}
