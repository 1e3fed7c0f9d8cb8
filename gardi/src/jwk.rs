//! JSON Web Keys ([RFC7517][])
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use aliri_base64::Base64Url;
use aliri_braid::braid;
use serde::Deserialize;

use crate::{error::KeyError, jwa};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to a JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// An identified JSON Web Key
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: Option<KeyId>,
    usage: Option<jwa::Usage>,
    algorithm: Option<jwa::Algorithm>,
    key: Key,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Key {
    Hmac(jwa::Hmac),
    Rsa(jwa::Rsa),
}

impl Key {
    fn is_compatible(&self, alg: jwa::Algorithm) -> bool {
        match self {
            Self::Hmac(_) => alg == jwa::Algorithm::HS256,
            Self::Rsa(_) => alg == jwa::Algorithm::RS256,
        }
    }
}

impl Jwk {
    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The algorithm to be used with this key
    #[must_use]
    pub fn algorithm(&self) -> Option<jwa::Algorithm> {
        self.algorithm
    }

    /// Whether the key material can be used with the given algorithm
    #[must_use]
    pub fn is_compatible(&self, alg: jwa::Algorithm) -> bool {
        self.key.is_compatible(alg)
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: KeyId) -> Self {
        Self {
            key_id: Some(kid),
            ..self
        }
    }

    /// Sets the algorithm and usage consistent with that algorithm
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Self {
        Self {
            algorithm: Some(alg),
            usage: Some(alg.to_usage()),
            ..self
        }
    }

    fn check_use(&self, alg: jwa::Algorithm) -> Result<(), KeyError> {
        if !self.key.is_compatible(alg) {
            return Err(KeyError::IncompatibleAlgorithm(alg));
        }

        if let Some(key_alg) = self.algorithm {
            if key_alg != alg {
                return Err(KeyError::IncompatibleAlgorithm(alg));
            }
        }

        if let Some(usage) = self.usage {
            if usage != jwa::Usage::Signing {
                return Err(KeyError::UsageMismatch);
            }
        }

        Ok(())
    }

    /// Verifies a signature over `data` using the specified algorithm
    ///
    /// # Errors
    ///
    /// Returns an error if the key is incompatible with the algorithm, is not
    /// a signing key, or if the signature does not match.
    pub fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), KeyError> {
        self.check_use(alg)?;

        match &self.key {
            Key::Hmac(hmac) => hmac.verify(data, signature),
            Key::Rsa(rsa) => rsa.verify(data, signature),
        }
    }

    /// Signs `data` using the specified algorithm
    ///
    /// # Errors
    ///
    /// Returns an error if the key is incompatible with the algorithm or
    /// holds no private component. Only HMAC keys can sign; RSA keys in this
    /// crate carry public components only.
    pub fn sign(&self, alg: jwa::Algorithm, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.check_use(alg)?;

        match &self.key {
            Key::Hmac(hmac) => Ok(hmac.sign(data)),
            Key::Rsa(_) => Err(KeyError::MissingPrivateKey),
        }
    }
}

impl From<jwa::Hmac> for Jwk {
    fn from(key: jwa::Hmac) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key: Key::Hmac(key),
        }
    }
}

impl From<jwa::Rsa> for Jwk {
    fn from(key: jwa::Rsa) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key: Key::Rsa(key),
        }
    }
}

#[derive(Deserialize)]
struct JwkDto {
    #[serde(default)]
    kid: Option<KeyId>,
    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,
    #[serde(default)]
    alg: Option<jwa::Algorithm>,
    kty: String,
    #[serde(default)]
    n: Option<Base64Url>,
    #[serde(default)]
    e: Option<Base64Url>,
    #[serde(default)]
    k: Option<Base64Url>,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = KeyError;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        let key = match dto.kty.as_str() {
            "RSA" => match (dto.n, dto.e) {
                (Some(n), Some(e)) => Key::Rsa(jwa::Rsa::from_components(n, e)?),
                _ => {
                    return Err(KeyError::Rejected(String::from(
                        "RSA key missing modulus or exponent",
                    )))
                }
            },
            "oct" => match dto.k {
                Some(k) => Key::Hmac(jwa::Hmac::new(k)),
                None => {
                    return Err(KeyError::Rejected(String::from(
                        "symmetric key missing secret",
                    )))
                }
            },
            other => {
                return Err(KeyError::Rejected(format!(
                    "unsupported key type '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            key_id: dto.kid,
            usage: dto.usage,
            algorithm: dto.alg,
            key,
        })
    }
}
