//! Authentication extractors.
//!
//! Handlers declare their authentication requirement in the signature:
//! `RequireAuth` rejects with 401 before the handler body runs,
//! `OptionalAuth` hands over `None` for anonymous requests. Both verify
//! the session cookie against the identity collaborator on every request;
//! the storefront holds no session state of its own.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::identity::{Identity, IdentityError};
use crate::state::AppState;

use super::session;

/// Extractor that requires a signed-in identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("hello, {}", identity.subject_id)
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session::session_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthenticated("missing session cookie".to_owned()))?;
        let identity = state.identity().verify(&token).await?;
        Ok(Self(identity))
    }
}

/// Extractor that optionally resolves the signed-in identity.
///
/// An absent or invalid cookie yields `None`; only an identity-provider
/// outage is surfaced as an error, so a stale cookie never breaks
/// anonymous browsing.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session::session_token(&parts.headers) else {
            return Ok(Self(None));
        };
        match state.identity().verify(&token).await {
            Ok(identity) => Ok(Self(Some(identity))),
            Err(IdentityError::Unauthenticated) => Ok(Self(None)),
            Err(e @ IdentityError::Upstream(_)) => Err(e.into()),
        }
    }
}
