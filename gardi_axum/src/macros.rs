//! Macros for declaring endpoint guards bound to a required permission

/// Constructs an extractor that asserts the presented token carries a
/// specific permission.
///
/// For a more concise way to construct several guards, see
/// [`permission_guards!`][crate::permission_guards!].
///
/// ```
/// use gardi_axum::permission_guard;
///
/// permission_guard!(GetDrinksDetail; "get:drinks-detail");
/// ```
///
/// A guard can then be used on an axum handler endpoint to assert that
/// the presented JWT is valid according to the [`Authority`] shared via
/// request extensions _and_ that it grants the named permission. On
/// success the verified claims are available through the guard.
///
/// ```no_run
/// use gardi_axum::permission_guard;
/// use axum::routing::get;
/// use axum::Router;
///
/// permission_guard!(GetDrinksDetail; "get:drinks-detail");
///
/// async fn drinks_detail(_: GetDrinksDetail) -> &'static str {
///     "the secret recipes"
/// }
///
/// let router: Router = Router::new().route("/drinks-detail", get(drinks_detail));
/// ```
///
/// A custom claims type may be named to carry application-specific
/// claims:
///
/// ```
/// use gardi::jwt;
/// use gardi_auth0::{HasPermissions, PermissionSet};
/// use gardi_axum::permission_guard;
/// use aliri_clock::UnixTime;
/// use serde::Deserialize;
///
/// #[derive(Clone, Debug, Deserialize)]
/// pub struct CustomClaims {
///     sub: jwt::Subject,
///     #[serde(default)]
///     aud: jwt::Audiences,
///     exp: UnixTime,
///     permissions: Option<PermissionSet>,
/// }
///
/// impl jwt::RegisteredClaims for CustomClaims {
///     fn exp(&self) -> Option<UnixTime> { Some(self.exp) }
///     fn aud(&self) -> &jwt::Audiences { &self.aud }
///     fn iss(&self) -> Option<&jwt::IssuerRef> { None }
///     fn sub(&self) -> Option<&jwt::SubjectRef> { Some(&self.sub) }
/// }
///
/// impl HasPermissions for CustomClaims {
///     fn permissions(&self) -> Option<&PermissionSet> { self.permissions.as_ref() }
/// }
///
/// permission_guard!(PostActors(CustomClaims); "post:actors");
///
/// async fn create_actor(PostActors(claims): PostActors) -> String {
///     format!("created by {}", claims.sub)
/// }
/// ```
///
/// [`Authority`]: gardi_auth0::Authority
#[macro_export]
macro_rules! permission_guard {
    ($vis:vis $i:ident; $permission:literal) => {
        $crate::permission_guard!($vis $i(::gardi_auth0::Claims); $permission);
    };
    ($vis:vis $i:ident($claim:ty); $permission:literal) => {
        /// Ensures that the bearer of the presented token holds the
        /// required permission
        ///
        /// The guard extracts the `Authorization` header, verifies the
        /// bearer token against the shared authority, and confirms the
        /// verified claims grant the permission:
        #[doc = concat!("`", $permission, "`")]
        $vis struct $i($vis $claim);

        impl $i {
            #[allow(dead_code)]
            $vis fn into_claims(self) -> $claim {
                self.0
            }

            #[allow(dead_code)]
            $vis fn claims(&self) -> &$claim {
                &self.0
            }
        }

        impl $crate::EndpointPermission for $i {
            type Claims = $claim;

            fn required_permission() -> &'static $crate::__private::PermissionRef {
                static PERMISSION: $crate::__private::OnceCell<$crate::__private::Permission> =
                    $crate::__private::OnceCell::new();
                PERMISSION
                    .get_or_init(|| $permission.parse().unwrap())
                    .as_ref()
            }
        }

        #[::axum::async_trait]
        impl<S> ::axum::extract::FromRequestParts<S> for $i
        where
            S: Sync,
        {
            type Rejection = $crate::AuthRejection;

            async fn from_request_parts(
                req: &mut ::axum::http::request::Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                $crate::__private::authorize(
                    req,
                    <Self as $crate::EndpointPermission>::required_permission(),
                )
                .await
                .map(Self)
            }
        }
    };
}

/// Convenience macro for services that guard many endpoints.
///
/// # Example
///
/// ```
/// use gardi_axum::permission_guards;
///
/// permission_guards! {
///     guard GetDrinksDetail = "get:drinks-detail";
///     guard PostDrinks = "post:drinks";
///     guard PatchDrinks = "patch:drinks";
///     guard DeleteDrinks = "delete:drinks";
/// }
/// ```
///
/// The above defines a guard type for each permission, as the
/// [`permission_guard!`] macro would. A custom claims type applies to
/// every guard in the block with a `type Claims = <...>` declaration.
#[macro_export]
macro_rules! permission_guards {
    ($($vis:vis guard $i:ident = $permission:literal);* $(;)?) => {
        $(
            $crate::permission_guard!($vis $i; $permission);
        )*
    };
    (type Claims = $claims:ty; $($vis:vis guard $i:ident = $permission:literal);* $(;)?) => {
        $(
            $crate::permission_guard!($vis $i($claims); $permission);
        )*
    };
}
