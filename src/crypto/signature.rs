use hmac::{Hmac, Mac as _};
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use p384::ecdsa::{
    Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey,
};
use p521::ecdsa::{
    Signature as P521Signature, SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey,
};
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use signature::{SignatureEncoding as _, Signer as _, Verifier as _};

use crate::error::Error;
use crate::keys::KeyMaterial;

#[cfg(feature = "async-validate")]
use super::BoxFuture;

/// Computes and verifies JWS signatures over the signing input
/// `ascii(header) || '.' || ascii(payload)`.
///
/// `verify` distinguishes a signature that does not match (`Ok(false)`) from a
/// provider fault (`Err`); the validator accumulates faults across candidate
/// keys instead of aborting. The async flavours exist so a provider backed by
/// a remote signer can suspend; the defaults delegate to the sync calls.
pub trait SignatureProvider: Send + Sync {
    fn algorithm(&self) -> &str;

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error>;

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, Error>;

    #[cfg(feature = "async-validate")]
    fn sign_async<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, Error>> {
        Box::pin(std::future::ready(self.sign(data)))
    }

    #[cfg(feature = "async-validate")]
    fn verify_async<'a>(
        &'a self,
        data: &'a [u8],
        signature: &'a [u8],
    ) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(std::future::ready(self.verify(data, signature)))
    }
}

pub(crate) struct HmacSignatureProvider {
    algorithm: String,
    key: Vec<u8>,
}

impl HmacSignatureProvider {
    pub(crate) fn new(key: &[u8], algorithm: &str) -> Result<Self, Error> {
        if key.is_empty() {
            return Err(Error::NotSupported(format!(
                "{algorithm} requires a non-empty symmetric key"
            )));
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            key: key.to_vec(),
        })
    }

    fn compute(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        macro_rules! mac {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(&self.key)
                    .map_err(|e| Error::InvalidSignature(format!("hmac key error: {e}")))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }};
        }
        match self.algorithm.as_str() {
            "HS256" => mac!(Sha256),
            "HS384" => mac!(Sha384),
            "HS512" => mac!(Sha512),
            other => Err(Error::NotSupported(format!(
                "unknown hmac algorithm {other}"
            ))),
        }
    }
}

impl SignatureProvider for HmacSignatureProvider {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        self.compute(data)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, Error> {
        macro_rules! verify_mac {
            ($digest:ty) => {{
                let mut mac = Hmac::<$digest>::new_from_slice(&self.key)
                    .map_err(|e| Error::InvalidSignature(format!("hmac key error: {e}")))?;
                mac.update(data);
                Ok(mac.verify_slice(signature).is_ok())
            }};
        }
        match self.algorithm.as_str() {
            "HS256" => verify_mac!(Sha256),
            "HS384" => verify_mac!(Sha384),
            "HS512" => verify_mac!(Sha512),
            other => Err(Error::NotSupported(format!(
                "unknown hmac algorithm {other}"
            ))),
        }
    }
}

pub(crate) struct RsaSignatureProvider {
    algorithm: String,
    private: Option<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl RsaSignatureProvider {
    pub(crate) fn new(private: Option<RsaPrivateKey>, public: RsaPublicKey, algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            private,
            public,
        }
    }
}

impl SignatureProvider for RsaSignatureProvider {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let Some(private) = &self.private else {
            return Err(Error::NotSupported(format!(
                "signing with {} requires private material",
                self.algorithm
            )));
        };
        let signature = match self.algorithm.as_str() {
            "RS256" => RsaSigningKey::<Sha256>::new(private.clone()).sign(data).to_vec(),
            "RS384" => RsaSigningKey::<Sha384>::new(private.clone()).sign(data).to_vec(),
            "RS512" => RsaSigningKey::<Sha512>::new(private.clone()).sign(data).to_vec(),
            other => {
                return Err(Error::NotSupported(format!(
                    "unknown rsa algorithm {other}"
                )))
            }
        };
        Ok(signature)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, Error> {
        let Ok(signature) = RsaSignature::try_from(signature) else {
            return Ok(false);
        };
        let verified = match self.algorithm.as_str() {
            "RS256" => RsaVerifyingKey::<Sha256>::new(self.public.clone())
                .verify(data, &signature)
                .is_ok(),
            "RS384" => RsaVerifyingKey::<Sha384>::new(self.public.clone())
                .verify(data, &signature)
                .is_ok(),
            "RS512" => RsaVerifyingKey::<Sha512>::new(self.public.clone())
                .verify(data, &signature)
                .is_ok(),
            other => {
                return Err(Error::NotSupported(format!(
                    "unknown rsa algorithm {other}"
                )))
            }
        };
        Ok(verified)
    }
}

/// ECDSA over the NIST curves with the raw `r || s` signature form JWS uses.
pub(crate) struct EcdsaSignatureProvider {
    algorithm: String,
    keys: EcdsaKeys,
}

enum EcdsaKeys {
    P256 {
        private: Option<P256SigningKey>,
        public: P256VerifyingKey,
    },
    P384 {
        private: Option<P384SigningKey>,
        public: P384VerifyingKey,
    },
    P521 {
        private: Option<P521SigningKey>,
        public: P521VerifyingKey,
    },
}

impl EcdsaSignatureProvider {
    pub(crate) fn new(material: &KeyMaterial, algorithm: &str) -> Result<Self, Error> {
        let keys = match material {
            KeyMaterial::P256 { private, public } => EcdsaKeys::P256 {
                private: private.clone(),
                public: *public,
            },
            KeyMaterial::P384 { private, public } => EcdsaKeys::P384 {
                private: private.clone(),
                public: *public,
            },
            KeyMaterial::P521 { private, public } => EcdsaKeys::P521 {
                private: private.clone(),
                public: public.clone(),
            },
            _ => {
                return Err(Error::NotSupported(format!(
                    "{algorithm} requires an EC key"
                )))
            }
        };
        Ok(Self {
            algorithm: algorithm.to_string(),
            keys,
        })
    }

    pub(crate) fn can_sign(&self) -> bool {
        match &self.keys {
            EcdsaKeys::P256 { private, .. } => private.is_some(),
            EcdsaKeys::P384 { private, .. } => private.is_some(),
            EcdsaKeys::P521 { private, .. } => private.is_some(),
        }
    }
}

impl SignatureProvider for EcdsaSignatureProvider {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let missing = || {
            Error::NotSupported(format!(
                "signing with {} requires private material",
                self.algorithm
            ))
        };
        match &self.keys {
            EcdsaKeys::P256 { private, .. } => {
                let key = private.as_ref().ok_or_else(missing)?;
                let signature: P256Signature = key.sign(data);
                Ok(signature.to_bytes().to_vec())
            }
            EcdsaKeys::P384 { private, .. } => {
                let key = private.as_ref().ok_or_else(missing)?;
                let signature: P384Signature = key.sign(data);
                Ok(signature.to_bytes().to_vec())
            }
            EcdsaKeys::P521 { private, .. } => {
                let key = private.as_ref().ok_or_else(missing)?;
                let signature: P521Signature = key.sign(data);
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, Error> {
        match &self.keys {
            EcdsaKeys::P256 { public, .. } => {
                let Ok(signature) = P256Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(public.verify(data, &signature).is_ok())
            }
            EcdsaKeys::P384 { public, .. } => {
                let Ok(signature) = P384Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(public.verify(data, &signature).is_ok())
            }
            EcdsaKeys::P521 { public, .. } => {
                let Ok(signature) = P521Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(public.verify(data, &signature).is_ok())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HmacSignatureProvider, SignatureProvider};

    #[test]
    fn hmac_sign_verify_round_trip() {
        let provider = HmacSignatureProvider::new(&[7u8; 32], "HS256").expect("provider");
        let signature = provider.sign(b"header.payload").expect("sign");
        assert_eq!(signature.len(), 32);
        assert!(provider.verify(b"header.payload", &signature).expect("verify"));
        assert!(!provider.verify(b"header.tampered", &signature).expect("verify"));
    }

    #[test]
    fn hmac_output_length_tracks_digest() {
        let p384 = HmacSignatureProvider::new(&[1u8; 48], "HS384").expect("provider");
        let p512 = HmacSignatureProvider::new(&[1u8; 64], "HS512").expect("provider");
        assert_eq!(p384.sign(b"x").expect("sign").len(), 48);
        assert_eq!(p512.sign(b"x").expect("sign").len(), 64);
    }

    #[test]
    fn hmac_rejects_empty_key() {
        assert!(HmacSignatureProvider::new(&[], "HS256").is_err());
    }
}
