//! Bearer-token authentication middleware
//!
//! Applied to protected routes only. Rejects before any handler logic runs:
//! missing or malformed `Authorization` header, bad signature, expired token,
//! or a token whose user no longer exists all produce 401. On success the
//! resolved [`CurrentUser`] is placed in request extensions.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use camel_common::auth::{parse_bearer, AuthError};

use crate::db;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    let token = parse_bearer(header)?;
    let claims = state.tokens.validate(token)?;
    let user_id = claims.user_id()?;

    let user = db::get_user(&state.db, user_id)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
    });

    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("route is missing auth middleware".to_string()))
    }
}
