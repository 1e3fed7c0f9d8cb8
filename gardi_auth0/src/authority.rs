//! A JWKS-backed authority composing token verification and the
//! permission check

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use gardi::{jwt, Jwks, JwtRef};
use reqwest::{
    header::{self, HeaderValue},
    Client, StatusCode,
};
use serde::Deserialize;

use crate::{check_permission, extract_token, AuthError, HasPermissions, PermissionRef};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct VolatileData {
    jwks: Jwks,
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
}

impl VolatileData {
    fn new(jwks: Jwks) -> Self {
        Self {
            jwks,
            etag: None,
            last_modified: None,
        }
    }
}

#[derive(Debug)]
struct RemoteOptions {
    jwks_url: String,
    client: Client,
}

#[derive(Debug)]
struct Inner {
    data: ArcSwap<VolatileData>,
    remote: Option<RemoteOptions>,
    validator: jwt::Validator,
    refresh_flight: tokio::sync::Mutex<()>,
}

/// An authority backed by a potentially dynamic JSON Web Key Set (JWKS)
/// held by a remote identity provider
///
/// The authority is the single entry point for route handlers: it
/// extracts the bearer token from a raw `Authorization` header value,
/// verifies it against the cached key set, and confirms the required
/// permission, returning either the verified claims or the first
/// [`AuthError`] encountered. It performs no response handling of its
/// own.
#[derive(Debug, Clone)]
#[must_use]
pub struct Authority {
    inner: Arc<Inner>,
}

impl Authority {
    /// Constructs a new authority from an existing JWKS
    pub fn new(jwks: Jwks, validator: jwt::Validator) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: ArcSwap::from_pointee(VolatileData::new(jwks)),
                remote: None,
                validator,
                refresh_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Constructs a new authority, fetching the initial JWKS from a URL
    ///
    /// The HTTP client carries a fixed request timeout so that an
    /// unreachable identity provider fails rather than hangs.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial JWKS fetch fails.
    pub async fn new_from_url(
        jwks_url: String,
        validator: jwt::Validator,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("gardi_auth0/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        let response = client.get(&jwks_url).send().await?;
        response.error_for_status_ref()?;

        let etag = response.headers().get(header::ETAG).map(ToOwned::to_owned);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .map(ToOwned::to_owned);
        let jwks = response.json::<Jwks>().await?;

        tracing::info!(jwks.url = %jwks_url, "JWKS fetched");

        Ok(Self {
            inner: Arc::new(Inner {
                data: ArcSwap::from_pointee(VolatileData {
                    jwks,
                    etag,
                    last_modified,
                }),
                remote: Some(RemoteOptions { jwks_url, client }),
                validator,
                refresh_flight: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Spawns a non-terminating task that refreshes the JWKS on the
    /// given interval
    pub fn spawn_refresh(&self, interval: Duration) {
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                // Ignore any errors; we'll just try again next time
                let _ = this.refresh().await;
            }
        });
    }

    /// Refreshes the JWKS from the remote URL
    ///
    /// No retries are attempted. If the attempt to refresh the JWKS from
    /// the remote URL fails, no change is made to the cached JWKS. An
    /// authority constructed without a remote URL is unaffected.
    #[tracing::instrument(skip(self), fields(jwks.url = tracing::field::Empty))]
    pub async fn refresh(&self) -> Result<(), reqwest::Error> {
        if let Some(remote) = &self.inner.remote {
            let span = tracing::Span::current();
            span.record("jwks.url", &remote.jwks_url);
            tracing::debug!("refreshing JWKS");
            let mut request = remote.client.get(&remote.jwks_url);

            {
                let data = self.inner.data.load();
                if let Some(etag) = &data.etag {
                    request = request.header(header::IF_NONE_MATCH, etag)
                } else if let Some(last_modified) = &data.last_modified {
                    request = request.header(header::IF_MODIFIED_SINCE, last_modified)
                }
            }

            let response = request.send().await?;

            if response.status() == StatusCode::NOT_MODIFIED {
                tracing::debug!("JWKS not modified");
                return Ok(());
            } else if let Err(err) = response.error_for_status_ref() {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(
                    error,
                    http.status_code = response.status().as_u16(),
                    "JWKS refresh failed; unexpected response status",
                );
                return Err(err);
            }

            let etag = response.headers().get(header::ETAG).map(ToOwned::to_owned);
            let last_modified = response
                .headers()
                .get(header::LAST_MODIFIED)
                .map(ToOwned::to_owned);
            match response.json::<Jwks>().await {
                Ok(jwks) => {
                    self.inner.data.store(Arc::new(VolatileData {
                        jwks,
                        etag,
                        last_modified,
                    }));
                    tracing::info!("JWKS refreshed");
                }
                Err(err) => {
                    let error: &dyn std::error::Error = &err;
                    tracing::warn!(error, "JWKS refresh failed; unexpected error");
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Replaces the cached JWKS
    pub fn set_jwks(&self, jwks: Jwks) {
        self.inner.data.store(Arc::new(VolatileData::new(jwks)));
    }

    /// Verifies a bearer token against the cached key set
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, no cached key matches
    /// its key ID, the signature does not verify, or the registered
    /// claims are rejected.
    pub fn verify_token<T>(&self, token: &JwtRef) -> Result<T, AuthError>
    where
        T: for<'de> Deserialize<'de> + jwt::RegisteredClaims,
    {
        let decomposed = token.decompose()?;
        let validated: jwt::Validated<T> = self.verify_decomposed(decomposed)?;
        Ok(validated.extract().1)
    }

    /// Authorizes a request from its raw `Authorization` header value
    ///
    /// Extracts the bearer token, verifies it, and confirms the required
    /// permission, short-circuiting on the first failure. No failure is
    /// retried; calling again with the same token yields the same
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] encountered along the chain.
    pub fn authorize<T>(
        &self,
        header: Option<&str>,
        required: &PermissionRef,
    ) -> Result<T, AuthError>
    where
        T: for<'de> Deserialize<'de> + jwt::RegisteredClaims + HasPermissions,
    {
        let token = extract_token(header)?;
        let decomposed = token.decompose()?;
        let validated: jwt::Validated<T> = self.verify_decomposed(decomposed)?;
        check_permission(validated.claims(), required)?;
        Ok(validated.extract().1)
    }

    /// Authorizes a request, refreshing the JWKS once on an unknown key ID
    ///
    /// When the token names a key ID absent from the cached JWKS, the
    /// key set is refreshed from the remote URL before the lookup is
    /// retried, so a token signed with a freshly rotated key does not
    /// fail spuriously. Concurrent misses share a single refresh rather
    /// than each launching a fetch. A failed refresh fails closed as
    /// [`AuthError::KeyNotFound`].
    ///
    /// # Errors
    ///
    /// As [`authorize()`][Self::authorize].
    pub async fn authorize_with_refresh<T>(
        &self,
        header: Option<&str>,
        required: &PermissionRef,
    ) -> Result<T, AuthError>
    where
        T: for<'de> Deserialize<'de> + jwt::RegisteredClaims + HasPermissions,
    {
        let token = extract_token(header)?;
        let decomposed = token.decompose()?;
        let kid = decomposed
            .kid()
            .ok_or(AuthError::MalformedHeader("authorization malformed"))?;

        let known = {
            let guard = self.inner.data.load();
            guard.jwks.get_key(kid, decomposed.alg()).is_some()
        };

        if !known {
            let _flight = self.inner.refresh_flight.lock().await;
            // Another task may have refreshed while we waited
            let still_unknown = {
                let guard = self.inner.data.load();
                guard.jwks.get_key(kid, decomposed.alg()).is_none()
            };
            if still_unknown {
                if let Err(err) = self.refresh().await {
                    let error: &dyn std::error::Error = &err;
                    tracing::warn!(error, "JWKS refresh failed; failing closed");
                    return Err(AuthError::KeyNotFound);
                }
            }
        }

        let validated: jwt::Validated<T> = self.verify_decomposed(decomposed)?;
        check_permission(validated.claims(), required)?;
        Ok(validated.extract().1)
    }

    fn verify_decomposed<T>(
        &self,
        decomposed: jwt::Decomposed,
    ) -> Result<jwt::Validated<T>, AuthError>
    where
        T: for<'de> Deserialize<'de> + jwt::RegisteredClaims,
    {
        let kid = decomposed
            .kid()
            .ok_or(AuthError::MalformedHeader("authorization malformed"))?;
        let alg = decomposed.alg();

        let guard = self.inner.data.load();
        let key = guard.jwks.get_key(kid, alg).ok_or_else(|| {
            tracing::debug!(%kid, %alg, "unable to find matching key");
            AuthError::KeyNotFound
        })?;

        Ok(decomposed.verify(key, &self.inner.validator)?)
    }
}

#[cfg(test)]
mod tests {
    use aliri_base64::Base64Url;
    use aliri_clock::{Clock, System, UnixTime};
    use color_eyre::Result;
    use gardi::{jwa, jwk, Jwk};

    use super::*;
    use crate::{Claims, Permission, PermissionSet};

    const ISSUER: &str = "https://dev-tenant.auth0.com/";
    const AUDIENCE: &str = "drinks";

    fn test_key(kid: &str) -> Jwk {
        Jwk::from(jwa::Hmac::new(Base64Url::from_raw(b"test".to_vec())))
            .with_algorithm(jwa::Algorithm::HS256)
            .with_key_id(jwk::KeyId::new(kid.to_owned()))
    }

    fn test_authority() -> Authority {
        let mut jwks = Jwks::default();
        jwks.add_key(test_key("rotating key"));

        let validator = jwt::Validator::default()
            .add_approved_algorithm(jwa::Algorithm::HS256)
            .add_allowed_audience(jwt::Audience::from_static(AUDIENCE))
            .require_issuer(jwt::Issuer::from_static(ISSUER));

        Authority::new(jwks, validator)
    }

    fn base_claims() -> Claims {
        Claims::new()
            .with_issuer(jwt::Issuer::from_static(ISSUER))
            .with_audience(jwt::Audience::from_static(AUDIENCE))
            .with_subject(jwt::Subject::from_static("auth0|abc123"))
            .with_expiration(UnixTime(System.now().0 + 300))
    }

    fn signed_header(claims: &Claims) -> Result<String> {
        let headers = jwt::Headers::with_key_id(
            jwa::Algorithm::HS256,
            jwk::KeyId::from_static("rotating key"),
        );
        let token = gardi::Jwt::try_from_parts(&headers, claims, &test_key("rotating key"))?;
        Ok(format!("Bearer {}", token.as_str()))
    }

    fn required() -> &'static PermissionRef {
        PermissionRef::from_str("get:drinks-detail").expect("valid permission")
    }

    #[test]
    fn missing_header_fails_before_key_lookup() {
        // An empty key set would fail any lookup, so reaching the
        // resolver would surface KeyNotFound instead
        let authority = Authority::new(Jwks::default(), jwt::Validator::default());
        let res: Result<Claims, _> = authority.authorize(None, required());
        assert_eq!(res.unwrap_err(), AuthError::MissingAuthorizationHeader);
    }

    #[test]
    fn valid_token_with_permission_returns_claims() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let granted: Claims = authority.authorize(Some(&header), required())?;
        assert_eq!(granted, claims);
        Ok(())
    }

    #[test]
    fn authorize_is_idempotent() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let first: Claims = authority.authorize(Some(&header), required())?;
        let second: Claims = authority.authorize(Some(&header), required())?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_permission_is_forbidden() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let res: Result<Claims, _> =
            authority.authorize(Some(&header), PermissionRef::from_str("post:drinks")?);
        assert_eq!(res.unwrap_err(), AuthError::PermissionNotFound);
        Ok(())
    }

    #[test]
    fn absent_permissions_claim_is_a_bad_request() -> Result<()> {
        let authority = test_authority();
        let header = signed_header(&base_claims())?;

        let res: Result<Claims, _> = authority.authorize(Some(&header), required());
        assert_eq!(res.unwrap_err(), AuthError::MissingPermissionsClaim);
        Ok(())
    }

    #[test]
    fn unknown_kid_fails_with_key_not_found() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));

        let headers = jwt::Headers::with_key_id(
            jwa::Algorithm::HS256,
            jwk::KeyId::from_static("retired key"),
        );
        let token = gardi::Jwt::try_from_parts(&headers, &claims, &test_key("retired key"))?;
        let header = format!("Bearer {}", token.as_str());

        let res: Result<Claims, _> = authority.authorize(Some(&header), required());
        assert_eq!(res.unwrap_err(), AuthError::KeyNotFound);
        Ok(())
    }

    #[test]
    fn token_without_kid_is_malformed() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims();

        let headers = jwt::Headers::new(jwa::Algorithm::HS256);
        let token = gardi::Jwt::try_from_parts(&headers, &claims, &test_key("rotating key"))?;
        let header = format!("Bearer {}", token.as_str());

        let res: Result<Claims, _> = authority.authorize(Some(&header), required());
        assert_eq!(
            res.unwrap_err(),
            AuthError::MalformedHeader("authorization malformed")
        );
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_expiration(UnixTime(100))
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let res: Result<Claims, _> = authority.authorize(Some(&header), required());
        assert_eq!(res.unwrap_err(), AuthError::TokenExpired);
        Ok(())
    }

    #[test]
    fn wrong_audience_is_rejected() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_audience(jwt::Audience::from_static("somebody else's api"))
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let res: Result<Claims, _> = authority.authorize(Some(&header), required());
        assert_eq!(res.unwrap_err(), AuthError::InvalidClaims);
        Ok(())
    }

    #[test]
    fn tampered_token_fails_signature() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));
        let header = signed_header(&claims)?;

        let elevated = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("delete:drinks")?));
        let forged_payload = Base64Url::from_raw(serde_json::to_vec(&elevated)?);
        let token = header.trim_start_matches("Bearer ");
        let mut sections = token.split('.');
        let forged = format!(
            "Bearer {}.{}.{}",
            sections.next().expect("header"),
            forged_payload,
            sections.nth(1).expect("signature"),
        );

        let res: Result<Claims, _> = authority.authorize(Some(&forged), required());
        assert_eq!(res.unwrap_err(), AuthError::InvalidSignature);
        Ok(())
    }

    #[test]
    fn garbage_token_is_a_processing_error() {
        let authority = test_authority();
        let res: Result<Claims, _> =
            authority.authorize(Some("Bearer not-a-token"), required());
        assert_eq!(res.unwrap_err(), AuthError::TokenProcessingError);
    }

    #[tokio::test]
    async fn refresh_on_miss_fails_closed_without_a_remote() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));

        let headers = jwt::Headers::with_key_id(
            jwa::Algorithm::HS256,
            jwk::KeyId::from_static("retired key"),
        );
        let token = gardi::Jwt::try_from_parts(&headers, &claims, &test_key("retired key"))?;
        let header = format!("Bearer {}", token.as_str());

        let res: Result<Claims, _> = authority
            .authorize_with_refresh(Some(&header), required())
            .await;
        assert_eq!(res.unwrap_err(), AuthError::KeyNotFound);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_on_miss_finds_a_rotated_key() -> Result<()> {
        let authority = test_authority();
        let claims = base_claims()
            .with_permissions(PermissionSet::single(Permission::try_from("get:drinks-detail")?));

        let headers = jwt::Headers::with_key_id(
            jwa::Algorithm::HS256,
            jwk::KeyId::from_static("fresh key"),
        );
        let token = gardi::Jwt::try_from_parts(&headers, &claims, &test_key("fresh key"))?;
        let header = format!("Bearer {}", token.as_str());

        let res: Result<Claims, _> = authority
            .authorize_with_refresh(Some(&header), required())
            .await;
        assert_eq!(res.unwrap_err(), AuthError::KeyNotFound);

        // Key rotation lands in the cache; the same token now verifies
        let mut jwks = Jwks::default();
        jwks.add_key(test_key("rotating key"));
        jwks.add_key(test_key("fresh key"));
        authority.set_jwks(jwks);

        let granted: Claims = authority
            .authorize_with_refresh(Some(&header), required())
            .await?;
        assert_eq!(granted, claims);
        Ok(())
    }
}
