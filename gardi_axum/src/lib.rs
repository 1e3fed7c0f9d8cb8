//! Axum utilities for guarding routes with `gardi_auth0` permissions.
//!
//! A guard type declared with [`permission_guard!`] or
//! [`permission_guards!`] is an extractor: naming it as a handler
//! argument makes the route reject any request whose bearer token does
//! not carry the named permission, before the handler body runs. The
//! [`Authority`][gardi_auth0::Authority] is shared with routes as an
//! [`axum::Extension`] layer.
//!
//! # Full Example
//!
//! ```no_run
//! use gardi::{jwa, jwt};
//! use gardi_auth0::{Authority, Claims};
//! use axum::{
//!     extract::Path,
//!     routing::{get, post},
//!     Extension, Router,
//! };
//! use std::net::SocketAddr;
//!
//! mod guards {
//!     gardi_axum::permission_guards! {
//!         pub guard GetDrinksDetail = "get:drinks-detail";
//!         pub guard PostDrinks = "post:drinks";
//!         pub guard DeleteDrinks = "delete:drinks";
//!     }
//! }
//!
//! async fn drinks_detail(guard: guards::GetDrinksDetail) -> String {
//!     format!("hello, {:?}", guard.claims())
//! }
//!
//! async fn create_drink(_: guards::PostDrinks) -> &'static str {
//!     "created"
//! }
//!
//! async fn delete_drink(
//!     guards::DeleteDrinks(claims): guards::DeleteDrinks,
//!     Path(id): Path<u32>,
//! ) -> String {
//!     format!("{claims:?} deleted drink {id}")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let validator = jwt::Validator::default()
//!         .add_approved_algorithm(jwa::Algorithm::RS256)
//!         .add_allowed_audience(jwt::Audience::from_static("drinks"))
//!         .require_issuer(jwt::Issuer::from_static("https://dev-tenant.auth0.com/"));
//!
//!     let authority = Authority::new_from_url(
//!         "https://dev-tenant.auth0.com/.well-known/jwks.json".to_owned(),
//!         validator,
//!     )
//!     .await?;
//!     authority.spawn_refresh(std::time::Duration::from_secs(600));
//!
//!     let router = Router::new()
//!         .route("/drinks-detail", get(drinks_detail))
//!         .route("/drinks", post(create_drink))
//!         .route("/drinks/:id", axum::routing::delete(delete_drink))
//!         .layer(Extension(authority));
//!
//!     let listener = tokio::net::TcpListener::bind(&SocketAddr::new([0, 0, 0, 0].into(), 3000))
//!         .await?;
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
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

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use gardi_auth0::{AuthError, HasPermissions, PermissionRef};
use http::StatusCode;
use serde::Serialize;

mod macros;

/// Names the permission a given endpoint guard requires
pub trait EndpointPermission {
    /// The claims structure to verify and return if authorized
    type Claims: HasPermissions;

    /// The permission enforced when this type is used as an endpoint guard
    fn required_permission() -> &'static PermissionRef;
}

/// An error indicating that the request could not be authorized
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthRejection {
    /// No [`Authority`][gardi_auth0::Authority] extension was available
    /// to verify the request
    #[error("authorization authority is not configured")]
    MissingAuthority,

    /// The request failed authorization
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Serialize)]
struct AuthErrorBody {
    success: bool,
    message: AuthErrorMessage,
}

#[derive(Serialize)]
struct AuthErrorMessage {
    code: &'static str,
    description: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingAuthority => GenericError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "authorization authority is not configured",
            )
            .into_response(),
            Self::Auth(err) => {
                let status = StatusCode::from_u16(err.status())
                    .unwrap_or(StatusCode::UNAUTHORIZED);
                let body = AuthErrorBody {
                    success: false,
                    message: AuthErrorMessage {
                        code: err.code(),
                        description: err.description(),
                    },
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

/// A JSON error response for failures outside the authorization chain
///
/// Renders as `{"success": false, "error": <status>, "message": <text>}`,
/// the body shape used by route-level error handlers (not-found, bad
/// request payloads, and the like). Authorization failures use the
/// nested `{"code", "description"}` shape instead; see
/// [`AuthRejection`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct GenericError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct GenericErrorBody {
    success: bool,
    error: u16,
    message: String,
}

impl GenericError {
    /// Constructs an error response with the given status and message
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for GenericError {
    fn into_response(self) -> Response {
        let body = GenericErrorBody {
            success: false,
            error: self.status.as_u16(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[doc(hidden)]
pub mod __private {
    use gardi::jwt::RegisteredClaims;
    use gardi_auth0::{AuthError, Authority, HasPermissions};
    pub use gardi_auth0::{Permission, PermissionRef};
    use http::{header, request::Parts};
    pub use once_cell::sync::OnceCell;
    use serde::Deserialize;

    use crate::AuthRejection;

    pub async fn authorize<Claims>(
        req: &Parts,
        permission: &PermissionRef,
    ) -> Result<Claims, AuthRejection>
    where
        Claims: for<'de> Deserialize<'de> + RegisteredClaims + HasPermissions,
    {
        let authority = req
            .extensions
            .get::<Authority>()
            .ok_or(AuthRejection::MissingAuthority)?;

        let header = match req.headers.get(header::AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| {
                AuthRejection::Auth(AuthError::MalformedHeader("header must be bearer token"))
            })?),
        };

        Ok(authority.authorize_with_refresh(header, permission).await?)
    }
}
