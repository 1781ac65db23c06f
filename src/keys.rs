use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use p521::ecdsa::{SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
use pem::parse_many;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest as _, Sha1};
use sha2::Sha256;
use std::fmt;
use x509_cert::der::{Decode as _, Encode as _};
use x509_cert::Certificate;

use crate::base64url;
use crate::error::Error;

/// Cryptographic material plus an optional logical key id.
///
/// A key may carry private material (usable for signing) or public material
/// only (verification). The material itself is never printed or logged.
#[derive(Clone)]
pub struct SecurityKey {
    key_id: Option<String>,
    material: KeyMaterial,
}

#[derive(Clone)]
pub(crate) enum KeyMaterial {
    Symmetric(Vec<u8>),
    Rsa {
        private: Option<RsaPrivateKey>,
        public: RsaPublicKey,
    },
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
    X509 {
        thumbprint: String,
        public: Box<KeyMaterial>,
    },
}

impl SecurityKey {
    /// Creates a symmetric key from raw bytes.
    pub fn symmetric(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: None,
            material: KeyMaterial::Symmetric(key.into()),
        }
    }

    /// Loads an RSA or EC private key from PEM (PKCS#1 or PKCS#8 blocks).
    pub fn from_private_key_pem(pem_bytes: &[u8]) -> Result<Self, Error> {
        let blocks = parse_many(pem_bytes)
            .map_err(|e| Error::InvalidArgument(format!("pem parse error: {e}")))?;
        for block in blocks {
            match block.tag() {
                "RSA PRIVATE KEY" => {
                    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(block.contents()) {
                        return Ok(Self::from_rsa_private(key));
                    }
                }
                "PRIVATE KEY" => {
                    if let Ok(key) = RsaPrivateKey::from_pkcs8_der(block.contents()) {
                        return Ok(Self::from_rsa_private(key));
                    }
                    if let Ok(material) = ec_private_from_pkcs8(block.contents()) {
                        return Ok(Self {
                            key_id: None,
                            material,
                        });
                    }
                }
                _ => {}
            }
        }
        Err(Error::InvalidArgument(
            "unsupported private key format".to_string(),
        ))
    }

    /// Loads an RSA or EC public key from PEM (PKCS#1 or SPKI blocks).
    pub fn from_public_key_pem(pem_bytes: &[u8]) -> Result<Self, Error> {
        let blocks = parse_many(pem_bytes)
            .map_err(|e| Error::InvalidArgument(format!("pem parse error: {e}")))?;
        for block in blocks {
            match block.tag() {
                "RSA PUBLIC KEY" => {
                    if let Ok(key) = RsaPublicKey::from_pkcs1_der(block.contents()) {
                        return Ok(Self {
                            key_id: None,
                            material: KeyMaterial::Rsa {
                                private: None,
                                public: key,
                            },
                        });
                    }
                }
                "PUBLIC KEY" => {
                    if let Ok(material) = public_from_spki_der(block.contents()) {
                        return Ok(Self {
                            key_id: None,
                            material,
                        });
                    }
                }
                _ => {}
            }
        }
        Err(Error::InvalidArgument(
            "unsupported public key format".to_string(),
        ))
    }

    /// Loads a verification key from an X.509 certificate in DER form.
    ///
    /// The SHA-1 thumbprint of the certificate is recorded in base64url form
    /// and matched against the `x5t` header during key resolution.
    pub fn from_x509_der(der: &[u8]) -> Result<Self, Error> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::InvalidArgument(format!("x509 parse error: {e}")))?;
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::InvalidArgument(format!("x509 spki error: {e}")))?;
        let public = public_from_spki_der(&spki)?;
        let thumbprint = base64url::encode(Sha1::digest(der));
        Ok(Self {
            key_id: None,
            material: KeyMaterial::X509 {
                thumbprint,
                public: Box::new(public),
            },
        })
    }

    /// Sets the logical key id used for `kid`/`x5t` resolution.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// X.509 certificate thumbprint, when this key wraps a certificate.
    pub fn thumbprint(&self) -> Option<&str> {
        match &self.material {
            KeyMaterial::X509 { thumbprint, .. } => Some(thumbprint),
            _ => None,
        }
    }

    /// Key size in bits.
    pub fn key_size(&self) -> usize {
        self.material.key_size()
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self.material, KeyMaterial::Symmetric(_))
    }

    fn from_rsa_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        Self {
            key_id: None,
            material: KeyMaterial::Rsa {
                private: Some(private),
                public,
            },
        }
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.material
    }

    pub(crate) fn symmetric_bytes(&self) -> Option<&[u8]> {
        match &self.material {
            KeyMaterial::Symmetric(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deterministic identity for cache keys and issuer-key binding:
    /// `key_id` (when set) plus a digest of the public material.
    pub(crate) fn fingerprint(&self) -> String {
        let digest = base64url::encode(self.material.digest());
        match &self.key_id {
            Some(kid) => format!("{kid}|{digest}"),
            None => digest,
        }
    }

    /// Short identity used in multi-key trial reports; never key material.
    pub(crate) fn describe(&self) -> String {
        let kind = self.material.kind_name();
        match &self.key_id {
            Some(kid) => format!("{kind}(kid={kid})"),
            None => format!("{kind}({} bits)", self.key_size()),
        }
    }
}

impl fmt::Debug for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityKey")
            .field("key_id", &self.key_id)
            .field("kind", &self.material.kind_name())
            .field("key_size", &self.key_size())
            .finish()
    }
}

impl KeyMaterial {
    fn kind_name(&self) -> &'static str {
        match self {
            KeyMaterial::Symmetric(_) => "Symmetric",
            KeyMaterial::Rsa { .. } => "Rsa",
            KeyMaterial::P256 { .. } => "EcP256",
            KeyMaterial::P384 { .. } => "EcP384",
            KeyMaterial::P521 { .. } => "EcP521",
            KeyMaterial::X509 { .. } => "X509",
        }
    }

    fn key_size(&self) -> usize {
        match self {
            KeyMaterial::Symmetric(bytes) => bytes.len() * 8,
            KeyMaterial::Rsa { public, .. } => public.size() * 8,
            KeyMaterial::P256 { .. } => 256,
            KeyMaterial::P384 { .. } => 384,
            KeyMaterial::P521 { .. } => 521,
            KeyMaterial::X509 { public, .. } => public.key_size(),
        }
    }

    fn digest(&self) -> Vec<u8> {
        use sha2::Digest as _;
        let mut hasher = Sha256::new();
        match self {
            KeyMaterial::Symmetric(bytes) => hasher.update(bytes),
            KeyMaterial::Rsa { public, .. } => {
                if let Ok(der) = public.to_public_key_der() {
                    hasher.update(der.as_bytes());
                }
            }
            KeyMaterial::P256 { public, .. } => {
                hasher.update(public.to_encoded_point(false).as_bytes());
            }
            KeyMaterial::P384 { public, .. } => {
                hasher.update(public.to_encoded_point(false).as_bytes());
            }
            KeyMaterial::P521 { public, .. } => {
                hasher.update(public.to_encoded_point(false).as_bytes());
            }
            KeyMaterial::X509 { thumbprint, .. } => hasher.update(thumbprint.as_bytes()),
        }
        hasher.finalize().to_vec()
    }

    /// Strips the certificate wrapper, yielding the verification material.
    pub(crate) fn verification_material(&self) -> &KeyMaterial {
        match self {
            KeyMaterial::X509 { public, .. } => public,
            other => other,
        }
    }
}

fn ec_private_from_pkcs8(der: &[u8]) -> Result<KeyMaterial, Error> {
    if let Ok(secret) = p256::SecretKey::from_pkcs8_der(der) {
        let private = P256SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|e| Error::InvalidArgument(format!("p256 signing key error: {e}")))?;
        let public = *private.verifying_key();
        return Ok(KeyMaterial::P256 {
            private: Some(private),
            public,
        });
    }
    if let Ok(secret) = p384::SecretKey::from_pkcs8_der(der) {
        let private = P384SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|e| Error::InvalidArgument(format!("p384 signing key error: {e}")))?;
        let public = *private.verifying_key();
        return Ok(KeyMaterial::P384 {
            private: Some(private),
            public,
        });
    }
    if let Ok(secret) = p521::SecretKey::from_pkcs8_der(der) {
        let private = P521SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|e| Error::InvalidArgument(format!("p521 signing key error: {e}")))?;
        let public = P521VerifyingKey::from(&private);
        return Ok(KeyMaterial::P521 {
            private: Some(private),
            public,
        });
    }
    Err(Error::InvalidArgument(
        "unsupported ec pkcs8 private key".to_string(),
    ))
}

fn public_from_spki_der(der: &[u8]) -> Result<KeyMaterial, Error> {
    if let Ok(public) = RsaPublicKey::from_public_key_der(der) {
        return Ok(KeyMaterial::Rsa {
            private: None,
            public,
        });
    }
    if let Ok(public_key) = p256::PublicKey::from_public_key_der(der) {
        let encoded = public_key.to_encoded_point(false);
        let public = P256VerifyingKey::from_encoded_point(&encoded)
            .map_err(|e| Error::InvalidArgument(format!("p256 public key error: {e}")))?;
        return Ok(KeyMaterial::P256 {
            private: None,
            public,
        });
    }
    if let Ok(public_key) = p384::PublicKey::from_public_key_der(der) {
        let encoded = public_key.to_encoded_point(false);
        let public = P384VerifyingKey::from_encoded_point(&encoded)
            .map_err(|e| Error::InvalidArgument(format!("p384 public key error: {e}")))?;
        return Ok(KeyMaterial::P384 {
            private: None,
            public,
        });
    }
    if let Ok(public_key) = p521::PublicKey::from_public_key_der(der) {
        let encoded = public_key.to_encoded_point(false);
        let public = P521VerifyingKey::from_encoded_point(&encoded)
            .map_err(|e| Error::InvalidArgument(format!("p521 public key error: {e}")))?;
        return Ok(KeyMaterial::P521 {
            private: None,
            public,
        });
    }
    Err(Error::InvalidArgument(
        "unsupported public key material".to_string(),
    ))
}
