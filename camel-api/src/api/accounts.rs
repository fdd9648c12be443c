//! Account endpoints: signup, login, current user

use axum::{extract::State, http::StatusCode, Json};
use camel_common::auth::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;

/// Same message for unknown user and wrong password
const LOGIN_FAILED: &str = "Incorrect username or password";

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Loose `local@domain.tld` shape check
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !name.starts_with('.') && !tld.is_empty(),
        None => false,
    }
}

fn validate_signup(req: &SignupRequest) -> ApiResult<()> {
    let username_len = req.username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
        return Err(ApiError::invalid(
            "username",
            format!(
                "username must be between {} and {} characters",
                USERNAME_MIN, USERNAME_MAX
            ),
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::invalid("email", "email is not a valid address"));
    }
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::invalid(
            "password",
            format!("password must be at least {} characters", PASSWORD_MIN),
        ));
    }
    Ok(())
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validate_signup(&req)?;

    let digest = hash_password(&req.password);
    let user = db::create_user(
        &state.db,
        &req.username,
        &req.email,
        &digest.hash,
        &digest.salt,
    )
    .await?;

    info!(user_id = user.id, username = %user.username, "Account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let credentials = db::find_credentials_by_username(&state.db, &req.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(LOGIN_FAILED.to_string()))?;

    if !verify_password(
        &req.password,
        &credentials.password_hash,
        &credentials.password_salt,
    ) {
        return Err(ApiError::Unauthorized(LOGIN_FAILED.to_string()));
    }

    let access_token = state
        .tokens
        .issue(credentials.id, &credentials.username)?;

    info!(user_id = credentials.id, "Login succeeded");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<User>> {
    let user = db::get_user(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user.id)))?;
    Ok(Json(user))
}
