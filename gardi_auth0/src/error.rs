//! The closed set of authorization failures
//!
//! Every way a request can fail authorization maps to exactly one variant
//! here, and every variant carries a fixed HTTP status, a machine-readable
//! code, and a human-readable description. The route layer builds its
//! response bodies from those three fields alone.

use gardi::error::{ClaimsRejected, JwtVerifyError};
use thiserror::Error;

/// An authorization failure
///
/// The `Display` implementation produces the description reported to the
/// caller, unchanged from the point of detection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request carried no `Authorization` header
    #[error("Authorization not in header")]
    MissingAuthorizationHeader,

    /// The `Authorization` header or the token header section was not
    /// shaped like a bearer token
    #[error("{0}")]
    MalformedHeader(&'static str),

    /// The token signature did not verify against the elected key
    #[error("Invalid signature / token could not be verified")]
    InvalidSignature,

    /// The token expired at or before the current time
    #[error("token expired")]
    TokenExpired,

    /// The token's audience or issuer did not match the authority
    #[error("incorrect claims, check audience and issuer")]
    InvalidClaims,

    /// The token could not be decoded for any other reason
    #[error("unable to parse authentication token")]
    TokenProcessingError,

    /// No key in the current JWKS matched the token's key ID
    #[error("Unable to find the appropriate key")]
    KeyNotFound,

    /// The verified claims carried no permissions collection at all
    #[error("Permissions not included in JWT")]
    MissingPermissionsClaim,

    /// The verified claims did not carry the required permission
    #[error("Permission not found.")]
    PermissionNotFound,
}

impl AuthError {
    /// The HTTP status code for this failure
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::MissingAuthorizationHeader
            | Self::MalformedHeader(_)
            | Self::InvalidSignature
            | Self::TokenExpired
            | Self::InvalidClaims
            | Self::TokenProcessingError => 401,
            Self::KeyNotFound | Self::MissingPermissionsClaim => 400,
            Self::PermissionNotFound => 403,
        }
    }

    /// A stable machine-readable code for this failure
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuthorizationHeader => "authorization_header_missing",
            Self::MalformedHeader(_) => "invalid_header",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::InvalidClaims => "invalid_claims",
            Self::TokenProcessingError => "invalid_token",
            Self::KeyNotFound => "invalid_key",
            Self::MissingPermissionsClaim => "invalid_permissions",
            Self::PermissionNotFound => "unauthorized",
        }
    }

    /// The fixed human-readable description for this failure
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl From<JwtVerifyError> for AuthError {
    fn from(err: JwtVerifyError) -> Self {
        match err {
            JwtVerifyError::MalformedHeader(_) => Self::MalformedHeader("authorization malformed"),
            JwtVerifyError::KeyRejected(k) if k.is_signature_mismatch() => Self::InvalidSignature,
            JwtVerifyError::ClaimsRejected(c) => Self::from(c),
            JwtVerifyError::Malformed
            | JwtVerifyError::MalformedPayload(_)
            | JwtVerifyError::MalformedSignature(_)
            | JwtVerifyError::KeyRejected(_) => Self::TokenProcessingError,
        }
    }
}

impl From<ClaimsRejected> for AuthError {
    fn from(err: ClaimsRejected) -> Self {
        match err {
            ClaimsRejected::TokenExpired => Self::TokenExpired,
            ClaimsRejected::InvalidAudience
            | ClaimsRejected::InvalidIssuer
            | ClaimsRejected::MissingRequiredClaim(_) => Self::InvalidClaims,
            ClaimsRejected::InvalidAlgorithm => Self::TokenProcessingError,
        }
    }
}
