//! Signing algorithms and key material
//!
//! Only the algorithms actually used by the supported identity providers are
//! implemented: RS256 for keys published in a JWKS, and HS256 for local
//! authorities and tests.

use std::fmt;

use aliri_base64::{Base64Url, Base64UrlRef};
use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// A JSON Web Signature algorithm
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum Algorithm {
    /// HMAC using SHA-256
    HS256,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
}

impl Algorithm {
    /// The usage expected of a key signing with this algorithm
    #[must_use]
    pub const fn to_usage(self) -> Usage {
        Usage::Signing
    }

    /// The size in bytes of a signature produced by this algorithm
    #[must_use]
    pub const fn signature_size(self) -> usize {
        match self {
            Self::HS256 => 256 / 8,
            Self::RS256 => 256,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::HS256 => "HS256",
            Self::RS256 => "RS256",
        };
        f.write_str(s)
    }
}

/// The intended usage of a JSON Web Key
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Usage {
    /// The key may be used for signing and signature verification
    #[serde(rename = "sig")]
    Signing,

    /// The key may be used for encryption
    #[serde(rename = "enc")]
    Encryption,
}

/// An HMAC shared secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Hmac {
    #[serde(rename = "k")]
    secret: Base64Url,
}

impl fmt::Debug for Hmac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Hmac { secret }")
    }
}

impl Hmac {
    /// HMAC using the provided secret
    pub fn new(secret: impl Into<Base64Url>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, self.secret.as_slice());
        let digest = ring::hmac::sign(&key, data);
        digest.as_ref().to_owned()
    }

    pub(crate) fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, self.secret.as_slice());
        ring::hmac::verify(&key, data, signature).map_err(|_| KeyError::SignatureMismatch)
    }
}

/// An RSA public key, as published in a JWKS
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RsaDto")]
#[must_use]
pub struct Rsa {
    /// The public modulus
    #[serde(rename = "n")]
    modulus: Base64Url,

    /// The public exponent
    #[serde(rename = "e")]
    exponent: Base64Url,
}

impl Rsa {
    /// Constructs a public key from the modulus and exponent
    ///
    /// # Errors
    ///
    /// The modulus is not that of a 2048-bit key.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, KeyError> {
        let modulus = modulus.into();
        let exponent = exponent.into();
        if modulus.as_slice().len() != 256 {
            return Err(KeyError::Rejected(String::from(
                "key modulus must be 2048 bits",
            )));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public key's modulus
    pub fn modulus(&self) -> &Base64UrlRef {
        &self.modulus
    }

    /// The public key's exponent
    pub fn exponent(&self) -> &Base64UrlRef {
        &self.exponent
    }

    pub(crate) fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(&ring::signature::RSA_PKCS1_2048_8192_SHA256, data, signature)
            .map_err(|_| KeyError::SignatureMismatch)
    }
}

#[derive(Deserialize)]
struct RsaDto {
    n: Base64Url,
    e: Base64Url,
}

impl TryFrom<RsaDto> for Rsa {
    type Error = KeyError;

    fn try_from(dto: RsaDto) -> Result<Self, Self::Error> {
        Self::from_components(dto.n, dto.e)
    }
}
