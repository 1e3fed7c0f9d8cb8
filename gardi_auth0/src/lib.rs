//! Bearer-token authorization against an Auth0-style JWKS authority
//!
//! This crate turns a raw `Authorization` header value into either a
//! verified claim set or a typed [`AuthError`], in one pass:
//!
//! 1. Extract the bearer token ([`extract_token`])
//! 2. Elect the signing key by the token's key ID from a cached JWKS
//! 3. Verify the signature, audience, issuer, and expiry
//! 4. Confirm the claims grant the required [`Permission`]
//!
//! The [`Authority`] composes these steps behind a single call and keeps
//! the key set fresh with conditional HTTP refreshes. Every failure maps
//! to one member of a closed taxonomy carrying its own HTTP status,
//! machine code, and description, so the surrounding web layer can
//! serialize a response without inspecting anything else.
//!
//! This crate does not enable TLS support in `reqwest` itself. If your
//! application already uses `reqwest` with some TLS settings
//! (native/OpenSSL/rustls), then this crate will use those settings
//! automatically. Otherwise you may need to enable the `default-tls` or
//! `rustls-tls` feature on `reqwest` to fetch keys from an HTTPS
//! endpoint.
//!
//! ```no_run
//! use gardi::{jwa, jwt};
//! use gardi_auth0::{Authority, Claims, PermissionRef};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let validator = jwt::Validator::default()
//!     .add_approved_algorithm(jwa::Algorithm::RS256)
//!     .add_allowed_audience(jwt::Audience::from_static("drinks"))
//!     .require_issuer(jwt::Issuer::from_static("https://dev-tenant.auth0.com/"));
//!
//! let authority = Authority::new_from_url(
//!     "https://dev-tenant.auth0.com/.well-known/jwks.json".to_owned(),
//!     validator,
//! )
//! .await?;
//!
//! let claims: Claims = authority.authorize(
//!     Some("Bearer eyJhbGciOi…"),
//!     PermissionRef::from_str("get:drinks-detail")?,
//! )?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authority;
mod claims;
mod error;
pub mod permission;
mod token;

pub use authority::Authority;
pub use claims::Claims;
pub use error::AuthError;
pub use permission::{
    check_permission, HasPermissions, InvalidPermission, Permission, PermissionRef, PermissionSet,
};
pub use token::extract_token;
