//! Verification of JSON Web Tokens against JSON Web Key sets.
//!
//! This crate implements the slice of the JOSE standards needed to accept
//! bearer tokens issued by a remote identity provider:
//!
//! * JSON Web Key (JWK) and key sets (JWKS): [RFC7517][]
//! * JSON Web Algorithms (JWA), limited to HS256 and RS256: [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! Tokens are decomposed into their three sections, matched against a key by
//! key ID, and verified in a single pass that checks the signature and the
//! registered claims together. Claims are only ever surfaced through
//! [`jwt::Validated`], which cannot be constructed from an unverified token.
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use aliri_base64::Base64UrlRef;
//! use gardi::{jwa, jwk, jwt, Jwk, JwtRef};
//!
//! let token = JwtRef::from_str(concat!(
//!     "eyJhbGciOiJIUzI1NiIsImtpZCI6InRlc3Qga2V5In0.",
//!     "eyJzdWIiOiJkcml2ZXIiLCJhdWQiOiJteV9hcGkiLCJpc3MiOiJhdXRob3JpdHkifQ.",
//!     "zIfFMVTS1QHsWYwrJRtTp1Z0lzS8f98V5EKixQULlFA"
//! ));
//!
//! let secret = Base64UrlRef::from_slice(b"test").to_owned();
//! let key = Jwk::from(jwa::Hmac::new(secret))
//!     .with_algorithm(jwa::Algorithm::HS256)
//!     .with_key_id(jwk::KeyId::from_static("test key"));
//!
//! let mut keys = gardi::Jwks::default();
//! keys.add_key(key);
//!
//! let validator = jwt::Validator::default()
//!     .ignore_expiration()
//!     .add_approved_algorithm(jwa::Algorithm::HS256)
//!     .add_allowed_audience(jwt::Audience::from_static("my_api"))
//!     .require_issuer(jwt::Issuer::from_static("authority"));
//!
//! let decomposed = token.decompose().unwrap();
//! let key = keys
//!     .get_key(decomposed.kid().unwrap(), decomposed.alg())
//!     .unwrap();
//!
//! let data: jwt::Validated = decomposed.verify(key, &validator).unwrap();
//! # let _ = data;
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

pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jwt;

#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
