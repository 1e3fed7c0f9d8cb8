//! Common errors

use std::error::Error as StdError;

use thiserror::Error;

use crate::jwa;

/// An error occurring when a JWK cannot be used as requested
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key cannot be used with the requested algorithm
    #[error("key incompatible with algorithm '{0}'")]
    IncompatibleAlgorithm(jwa::Algorithm),

    /// The key has a usage that disallows this operation
    #[error("key cannot be used in this way")]
    UsageMismatch,

    /// The signature did not match
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The key holds no private component and cannot sign
    #[error("cannot sign without a private key")]
    MissingPrivateKey,

    /// The key material itself was rejected
    #[error("key rejected: {0}")]
    Rejected(String),
}

impl KeyError {
    /// Whether the error is due to a signature mismatch
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch)
    }
}

/// An error occurring while verifying a JWT
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// The JWT does not have the expected three-section shape
    #[error("malformed JWT")]
    Malformed,

    /// The JWT header section could not be decoded
    #[error("malformed JWT header")]
    MalformedHeader(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The JWT payload section could not be decoded
    #[error("malformed JWT payload")]
    MalformedPayload(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The JWT signature section could not be decoded
    #[error("malformed JWT signature")]
    MalformedSignature(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The JWT was rejected by the key
    #[error("token rejected by key")]
    KeyRejected(#[from] KeyError),

    /// The JWT was rejected by the claims validator
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),
}

pub(crate) fn malformed_header(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> JwtVerifyError {
    JwtVerifyError::MalformedHeader(source.into())
}

pub(crate) fn malformed_payload(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> JwtVerifyError {
    JwtVerifyError::MalformedPayload(source.into())
}

pub(crate) fn malformed_signature(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> JwtVerifyError {
    JwtVerifyError::MalformedSignature(source.into())
}

/// An error occurring when validating the claims of a JWT
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClaimsRejected {
    /// The token algorithm is not acceptable
    #[error("invalid algorithm")]
    InvalidAlgorithm,

    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token issuer is not acceptable
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// A required claim is missing
    #[error("required {0} claim missing")]
    MissingRequiredClaim(&'static str),
}
