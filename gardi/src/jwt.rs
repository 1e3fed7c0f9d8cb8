//! JSON Web Tokens ([RFC7519][])
//!
//! An unencrypted JWT is a three-part base64url-encoded string, the parts
//! separated by `.`: a JSON header electing the verification key, a JSON
//! payload of claims, and a binary signature over the first two parts.
//! Nothing in the header or payload may be trusted before the signature has
//! been verified against an approved key; the types in this module are
//! arranged so that claims are only reachable through [`Validated`], which is
//! only produced by a successful verification.
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519

use std::fmt;

use aliri_base64::Base64Url;
use aliri_braid::braid;
use aliri_clock::{Clock, System, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{error, jwa, jwk, Jwk};

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a JWT
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A JSON Web Token
///
/// The `Debug` and `Display` implementations on this type and [`JwtRef`]
/// redact the token to avoid unintentional disclosure: the default format
/// prints a placeholder, and the alternate format (`{:#}`/`{:#?}`) prints the
/// header and payload but elides the signature.
#[braid(serde, debug = "owned", display = "owned", ord = "omit")]
#[must_use]
pub struct Jwt;

impl fmt::Debug for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            write!(f, "\"{:#}\"", self)
        } else {
            f.write_str(concat!("***", "JWT", "***"))
        }
    }
}

impl fmt::Display for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            match self.0.rfind('.') {
                Some(last_period) => {
                    f.write_str(&self.0[..=last_period])?;
                    f.write_str("…")
                }
                None => f.write_str("…"),
            }
        } else {
            f.write_str(concat!("***", "JWT", "***"))
        }
    }
}

/// A set of zero or more [`Audience`]s
///
/// The `aud` claim may be serialized either as a bare string or as an array
/// of strings; both forms are accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany<Audience>", into = "OneOrMany<Audience>")]
#[repr(transparent)]
#[must_use]
pub struct Audiences(Vec<Audience>);

impl Audiences {
    /// An empty audience set
    #[inline]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// An audience set with a single audience
    #[inline]
    pub fn single(aud: impl Into<Audience>) -> Self {
        Self(vec![aud.into()])
    }

    /// Indicates whether the audience set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates through references to the audiences in the set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> {
        self.0.iter().map(AsRef::as_ref)
    }
}

/// A type representing one or more items, primarily for serialization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl From<OneOrMany<Audience>> for Audiences {
    #[inline]
    fn from(vals: OneOrMany<Audience>) -> Self {
        match vals {
            OneOrMany::One(x) => Self(vec![x]),
            OneOrMany::Many(v) => Self(v),
        }
    }
}

impl From<Audiences> for OneOrMany<Audience> {
    #[inline]
    fn from(mut vec: Audiences) -> Self {
        if vec.0.len() == 1 {
            Self::One(vec.0.pop().expect("len checked"))
        } else {
            Self::Many(vec.0)
        }
    }
}

impl From<Vec<Audience>> for Audiences {
    #[inline]
    fn from(vals: Vec<Audience>) -> Self {
        Self(vals)
    }
}

impl From<Audience> for Audiences {
    #[inline]
    fn from(aud: Audience) -> Self {
        Self::single(aud)
    }
}

/// The registered claims common to secure JWTs
///
/// A claims type implements this trait so that the validator can check the
/// timing, audience, and issuer constraints regardless of what other claims
/// the token carries.
pub trait RegisteredClaims {
    /// Expires: a verifier MUST reject the token after this time
    fn exp(&self) -> Option<UnixTime>;

    /// Audience: a verifier MUST reject the token if no audience is approved
    fn aud(&self) -> &Audiences;

    /// Issuer: a verifier MUST reject the token if the issuer is not approved
    fn iss(&self) -> Option<&IssuerRef>;

    /// Subject
    fn sub(&self) -> Option<&SubjectRef>;
}

/// The header section of a JWT
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Headers {
    alg: jwa::Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<jwk::KeyId>,
}

impl Headers {
    /// Constructs JWT headers to be signed by the specified algorithm
    pub const fn new(alg: jwa::Algorithm) -> Self {
        Self { alg, kid: None }
    }

    /// Constructs JWT headers with a specific signing algorithm and key ID
    pub fn with_key_id(alg: jwa::Algorithm, kid: impl Into<jwk::KeyId>) -> Self {
        Self {
            alg,
            kid: Some(kid.into()),
        }
    }

    /// The signing algorithm named by the token
    #[must_use]
    pub fn alg(&self) -> jwa::Algorithm {
        self.alg
    }

    /// The key ID naming which published key signed the token, if present
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.kid.as_deref()
    }
}

/// The validated headers and claims of a JWT
///
/// This type can only be produced by [`Decomposed::verify()`], asserting that
/// the signature and registered claims have already been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated<C = BasicClaims> {
    headers: Headers,
    claims: C,
}

impl<C> Validated<C> {
    /// Extracts the headers and claims from the token
    pub fn extract(self) -> (Headers, C) {
        (self.headers, self.claims)
    }

    /// The validated token headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The validated token claims
    pub fn claims(&self) -> &C {
        &self.claims
    }
}

/// A decomposed JWT, decoded far enough to elect a verification key
///
/// The header has been deserialized so that `kid` and `alg` may be
/// inspected, but nothing has been verified; the payload remains opaque
/// until [`verify()`][Self::verify] succeeds.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Decomposed<'a> {
    header: Headers,
    message: &'a str,
    payload: &'a str,
    signature: Base64Url,
}

macro_rules! expect_two {
    ($iter:expr) => {{
        let mut i = $iter;
        match (i.next(), i.next(), i.next()) {
            (Some(first), Some(second), None) => Some((first, second)),
            _ => None,
        }
    }};
}

impl<'a> Decomposed<'a> {
    /// The signing algorithm named by the (unverified) token header
    #[must_use]
    pub fn alg(&self) -> jwa::Algorithm {
        self.header.alg()
    }

    /// The key ID named by the (unverified) token header
    #[must_use]
    pub fn kid(&self) -> Option<&jwk::KeyIdRef> {
        self.header.kid()
    }

    /// Verifies the decomposed JWT against the given key and validation plan
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match, the payload cannot
    /// be decoded, or the claims are rejected by the validator.
    pub fn verify<C>(
        self,
        key: &Jwk,
        validator: &Validator,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: for<'de> Deserialize<'de> + RegisteredClaims,
    {
        self.verify_with_clock(key, validator, &System)
    }

    /// Verifies the decomposed JWT, telling time with the provided clock
    ///
    /// # Errors
    ///
    /// As [`verify()`][Self::verify].
    pub fn verify_with_clock<C, T: Clock>(
        self,
        key: &Jwk,
        validator: &Validator,
        clock: &T,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: for<'de> Deserialize<'de> + RegisteredClaims,
    {
        key.verify(
            self.header.alg(),
            self.message.as_bytes(),
            self.signature.as_slice(),
        )?;

        let p_raw = Base64Url::from_encoded(self.payload).map_err(error::malformed_payload)?;

        let payload: C =
            serde_json::from_slice(p_raw.as_slice()).map_err(error::malformed_payload)?;

        validator.validate_with_clock(&self.header, &payload, clock)?;

        Ok(Validated {
            headers: self.header,
            claims: payload,
        })
    }
}

impl JwtRef {
    /// Decomposes the JWT into its parts, preparing it for verification
    ///
    /// # Errors
    ///
    /// Returns an error if the JWT does not have exactly three sections or
    /// if the header or signature sections cannot be decoded.
    pub fn decompose(&self) -> Result<Decomposed, error::JwtVerifyError> {
        let (s_str, message) =
            expect_two!(self.as_str().rsplitn(2, '.')).ok_or(error::JwtVerifyError::Malformed)?;
        let (payload, h_str) =
            expect_two!(message.rsplitn(2, '.')).ok_or(error::JwtVerifyError::Malformed)?;
        let h_raw = Base64Url::from_encoded(h_str).map_err(error::malformed_header)?;
        let signature = Base64Url::from_encoded(s_str).map_err(error::malformed_signature)?;
        let header: Headers =
            serde_json::from_slice(h_raw.as_slice()).map_err(error::malformed_header)?;
        Ok(Decomposed {
            header,
            message,
            payload,
            signature,
        })
    }

    /// Verifies the token against a particular key and validation plan
    ///
    /// If the verification key must be elected by inspecting the token, use
    /// [`decompose()`][Self::decompose] first.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed or invalid according to
    /// the validator.
    pub fn verify<C>(
        &self,
        key: &Jwk,
        validator: &Validator,
    ) -> Result<Validated<C>, error::JwtVerifyError>
    where
        C: for<'de> Deserialize<'de> + RegisteredClaims,
    {
        self.decompose()?.verify(key, validator)
    }
}

impl Jwt {
    /// Constructs a new JWT from a header and payload, signed by the given key
    ///
    /// Used by local authorities and tests; tokens from a real identity
    /// provider arrive already signed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or if the key cannot sign
    /// with the algorithm named in the header.
    pub fn try_from_parts<P: Serialize>(
        headers: &Headers,
        payload: &P,
        key: &Jwk,
    ) -> Result<Self, error::JwtVerifyError> {
        use std::fmt::Write;

        let h_raw =
            Base64Url::from_raw(serde_json::to_vec(headers).map_err(error::malformed_header)?);
        let p_raw =
            Base64Url::from_raw(serde_json::to_vec(payload).map_err(error::malformed_payload)?);

        let mut message = String::new();
        write!(message, "{}.{}", h_raw, p_raw).expect("writes to strings never fail");

        let s = Base64Url::from_raw(key.sign(headers.alg(), message.as_bytes())?);

        write!(message, ".{}", s).expect("writes to strings never fail");

        Ok(Self::new(message))
    }
}

/// A validation plan for JWTs
///
/// The default plan approves no algorithms and requires an unexpired `exp`
/// claim with no grace period. The expiry boundary is inclusive: a token
/// whose `exp` equals the current time is already expired.
#[derive(Clone, Debug)]
#[must_use]
pub struct Validator {
    approved_algorithms: Vec<jwa::Algorithm>,
    allowed_audiences: Vec<Audience>,
    issuer: Option<Issuer>,
    leeway: u64,
    validate_exp: bool,
}

impl Default for Validator {
    #[inline]
    fn default() -> Self {
        Self {
            approved_algorithms: Vec::new(),
            allowed_audiences: Vec::new(),
            issuer: None,
            leeway: 0,
            validate_exp: true,
        }
    }
}

impl Validator {
    /// Approves a single algorithm
    #[inline]
    pub fn add_approved_algorithm(mut self, alg: jwa::Algorithm) -> Self {
        self.approved_algorithms.push(alg);
        self
    }

    /// Adds a single audience to the set of allowed audiences
    #[inline]
    pub fn add_allowed_audience(mut self, audience: Audience) -> Self {
        self.allowed_audiences.push(audience);
        self
    }

    /// Requires that tokens specify a particular issuer
    #[inline]
    pub fn require_issuer(self, issuer: Issuer) -> Self {
        Self {
            issuer: Some(issuer),
            ..self
        }
    }

    /// Allows a grace period (in seconds) on the expiry check
    #[inline]
    pub fn with_leeway_secs(self, leeway: u64) -> Self {
        Self { leeway, ..self }
    }

    /// Skips expiration checks
    #[inline]
    pub fn ignore_expiration(self) -> Self {
        Self {
            validate_exp: false,
            ..self
        }
    }

    pub(crate) fn validate_with_clock<C: Clock, T: RegisteredClaims>(
        &self,
        header: &Headers,
        claims: &T,
        clock: &C,
    ) -> Result<(), error::ClaimsRejected> {
        let now = clock.now();

        if !self.approved_algorithms.is_empty()
            && !self.approved_algorithms.iter().any(|&a| header.alg() == a)
        {
            return Err(error::ClaimsRejected::InvalidAlgorithm);
        }

        if self.validate_exp {
            if let Some(exp) = claims.exp() {
                // Inclusive boundary: exp == now is already expired
                if exp.0 <= now.0.saturating_sub(self.leeway) {
                    return Err(error::ClaimsRejected::TokenExpired);
                }
            } else {
                return Err(error::ClaimsRejected::MissingRequiredClaim("exp"));
            }
        }

        if !self.allowed_audiences.is_empty() {
            if claims.aud().is_empty() {
                return Err(error::ClaimsRejected::MissingRequiredClaim("aud"));
            }

            let found = claims
                .aud()
                .iter()
                .any(|a| self.allowed_audiences.iter().any(|e| a == e));
            if !found {
                return Err(error::ClaimsRejected::InvalidAudience);
            }
        }

        if let Some(allowed_iss) = &self.issuer {
            if let Some(iss) = claims.iss() {
                if iss != allowed_iss {
                    return Err(error::ClaimsRejected::InvalidIssuer);
                }
            } else {
                return Err(error::ClaimsRejected::MissingRequiredClaim("iss"));
            }
        }

        Ok(())
    }
}

/// The registered claims, and nothing else
///
/// A minimal concrete claims type for callers that do not carry
/// application-specific claims.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct BasicClaims {
    #[serde(default, skip_serializing_if = "Audiences::is_empty")]
    aud: Audiences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<Issuer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<Subject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<UnixTime>,
}

impl BasicClaims {
    /// Constructs a new, empty claims payload
    pub const fn new() -> Self {
        Self {
            aud: Audiences::empty(),
            iss: None,
            sub: None,
            exp: None,
        }
    }

    /// Sets the `aud` claim
    pub fn with_audience(mut self, aud: impl Into<Audience>) -> Self {
        self.aud = Audiences::single(aud);
        self
    }

    /// Sets the `iss` claim
    pub fn with_issuer(mut self, iss: impl Into<Issuer>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Sets the `sub` claim
    pub fn with_subject(mut self, sub: impl Into<Subject>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Sets the `exp` claim
    pub fn with_expiration(mut self, time: UnixTime) -> Self {
        self.exp = Some(time);
        self
    }
}

impl RegisteredClaims for BasicClaims {
    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::TestClock;
    use color_eyre::Result;

    use super::*;

    fn test_key() -> Jwk {
        Jwk::from(jwa::Hmac::new(Base64Url::from_raw(b"test".to_vec())))
            .with_algorithm(jwa::Algorithm::HS256)
            .with_key_id(jwk::KeyId::from_static("test key"))
    }

    #[test]
    fn deserialize_basic_claims() -> Result<()> {
        const DATA: &str = r#"{
                "exp": 345,
                "iss": "me"
            }"#;

        let basic: BasicClaims = serde_json::from_str(DATA)?;
        assert_eq!(basic.exp(), Some(UnixTime(345)));
        Ok(())
    }

    #[test]
    fn audiences_accept_string_or_array() -> Result<()> {
        let single: Audiences = serde_json::from_str(r#""one""#)?;
        let many: Audiences = serde_json::from_str(r#"["one", "two"]"#)?;
        assert_eq!(single.iter().count(), 1);
        assert_eq!(many.iter().count(), 2);
        Ok(())
    }

    #[test]
    fn decompose_rejects_two_section_token() {
        let err = JwtRef::from_str("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJtZSJ9")
            .decompose()
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::Malformed));
    }

    #[test]
    fn decompose_rejects_garbage_header() {
        let err = JwtRef::from_str("!!!.eyJzdWIiOiJtZSJ9.c2ln")
            .decompose()
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::MalformedHeader(_)));
    }

    #[test]
    fn round_trip_hs256() -> Result<()> {
        let key = test_key();

        let claims = BasicClaims::new()
            .with_audience(Audience::from_static("my_api"))
            .with_issuer(Issuer::from_static("authority"))
            .with_expiration(UnixTime(100));

        let headers = Headers::with_key_id(jwa::Algorithm::HS256, jwk::KeyId::from_static("test key"));
        let token = Jwt::try_from_parts(&headers, &claims, &key)?;

        let validator = Validator::default()
            .add_approved_algorithm(jwa::Algorithm::HS256)
            .add_allowed_audience(Audience::from_static("my_api"))
            .require_issuer(Issuer::from_static("authority"));

        let validated: Validated = token.decompose()?.verify_with_clock(
            &key,
            &validator,
            &TestClock::new(UnixTime(50)),
        )?;

        assert_eq!(validated.claims(), &claims);
        assert_eq!(validated.headers(), &headers);
        Ok(())
    }

    #[test]
    fn tampered_payload_fails_signature() -> Result<()> {
        let key = test_key();

        let claims = BasicClaims::new().with_expiration(UnixTime(100));
        let headers = Headers::new(jwa::Algorithm::HS256);
        let token = Jwt::try_from_parts(&headers, &claims, &key)?;

        let forged_payload = Base64Url::from_raw(
            serde_json::to_vec(&BasicClaims::new().with_expiration(UnixTime(10_000)))?,
        );
        let forged = Jwt::new(format!(
            "{}.{}.{}",
            token.as_str().split('.').next().expect("header"),
            forged_payload,
            token.as_str().rsplit('.').next().expect("signature"),
        ));

        let validator = Validator::default().ignore_expiration();
        let err = forged
            .decompose()?
            .verify::<BasicClaims>(&key, &validator)
            .unwrap_err();
        assert!(matches!(err, error::JwtVerifyError::KeyRejected(_)));
        Ok(())
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let validator = Validator::default();
        let header = Headers::new(jwa::Algorithm::HS256);
        let claims = BasicClaims::new().with_expiration(UnixTime(100));

        let at_boundary =
            validator.validate_with_clock(&header, &claims, &TestClock::new(UnixTime(100)));
        assert_eq!(at_boundary, Err(error::ClaimsRejected::TokenExpired));

        let just_before =
            validator.validate_with_clock(&header, &claims, &TestClock::new(UnixTime(99)));
        assert_eq!(just_before, Ok(()));
    }

    #[test]
    fn missing_exp_is_rejected_by_default() {
        let validator = Validator::default();
        let header = Headers::new(jwa::Algorithm::HS256);
        let claims = BasicClaims::new();

        let res = validator.validate_with_clock(&header, &claims, &TestClock::new(UnixTime(0)));
        assert_eq!(
            res,
            Err(error::ClaimsRejected::MissingRequiredClaim("exp"))
        );
    }

    #[test]
    fn audience_and_issuer_mismatches_are_rejected() {
        let validator = Validator::default()
            .ignore_expiration()
            .add_allowed_audience(Audience::from_static("expected"))
            .require_issuer(Issuer::from_static("authority"));
        let header = Headers::new(jwa::Algorithm::HS256);

        let wrong_aud = BasicClaims::new()
            .with_audience(Audience::from_static("other"))
            .with_issuer(Issuer::from_static("authority"));
        assert_eq!(
            validator.validate_with_clock(&header, &wrong_aud, &TestClock::default()),
            Err(error::ClaimsRejected::InvalidAudience)
        );

        let wrong_iss = BasicClaims::new()
            .with_audience(Audience::from_static("expected"))
            .with_issuer(Issuer::from_static("somebody else"));
        assert_eq!(
            validator.validate_with_clock(&header, &wrong_iss, &TestClock::default()),
            Err(error::ClaimsRejected::InvalidIssuer)
        );
    }

    #[test]
    fn unapproved_algorithm_is_rejected() {
        let validator = Validator::default()
            .ignore_expiration()
            .add_approved_algorithm(jwa::Algorithm::RS256);
        let header = Headers::new(jwa::Algorithm::HS256);
        let claims = BasicClaims::new();

        assert_eq!(
            validator.validate_with_clock(&header, &claims, &TestClock::default()),
            Err(error::ClaimsRejected::InvalidAlgorithm)
        );
    }

    #[test]
    fn debug_redacts_token() {
        let token = Jwt::from_static("aaa.bbb.ccc");
        assert_eq!(format!("{:?}", token), "***JWT***");
        assert_eq!(format!("{:#}", token), "aaa.bbb.…");
    }
}
