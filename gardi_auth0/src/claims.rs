//! The claim set expected from an Auth0-issued access token

use aliri_clock::UnixTime;
use gardi::jwt;
use serde::{Deserialize, Serialize};

use crate::{HasPermissions, PermissionSet};

/// The claims carried by an access token
///
/// The registered claims are validated during verification; the
/// `permissions` collection is what the permission check consumes. The
/// claim is kept as an `Option` so that a token with no permissions
/// collection at all can be told apart from one with an empty collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<jwt::Issuer>,
    #[serde(default, skip_serializing_if = "jwt::Audiences::is_empty")]
    aud: jwt::Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<jwt::Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<UnixTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<PermissionSet>,
}

impl Claims {
    /// Constructs a new, empty claim set
    pub const fn new() -> Self {
        Self {
            iss: None,
            aud: jwt::Audiences::empty(),
            sub: None,
            exp: None,
            iat: None,
            permissions: None,
        }
    }

    /// Sets the `iss` claim
    pub fn with_issuer(mut self, iss: impl Into<jwt::Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `aud` claim
    pub fn with_audience(mut self, aud: impl Into<jwt::Audience>) -> Self {
        self.aud = jwt::Audiences::single(aud);
        self
    }

    /// Sets the `sub` claim
    pub fn with_subject(mut self, sub: impl Into<jwt::Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }

    /// Sets the `iat` claim
    pub fn with_issued_at(mut self, time: UnixTime) -> Self {
        self.iat = Some(time);
        self
    }

    /// Sets the `permissions` claim
    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// The time the token was issued, if present
    #[must_use]
    pub fn issued_at(&self) -> Option<UnixTime> {
        self.iat
    }
}

impl jwt::RegisteredClaims for Claims {
    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &jwt::Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }
}

impl HasPermissions for Claims {
    fn permissions(&self) -> Option<&PermissionSet> {
        self.permissions.as_ref()
    }
}
