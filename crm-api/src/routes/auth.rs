/// Account lifecycle endpoints
///
/// - `POST /auth/register` - Create an unverified account and mail a verification link
/// - `POST /auth/login` - Exchange email and password for a bearer token
/// - `GET|POST /auth/verify-email?token=` - Consume a verification token
/// - `POST /auth/forgot_password` - Mail a password reset link
/// - `POST /auth/reset-password` - Consume a reset token and set a new password
///
/// Verification and reset tokens are single use. Only their SHA-256 digest is
/// stored; the plaintext exists in the outgoing email alone.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiQuery, ValidJson},
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use crm_shared::{
    auth::{
        password,
        tokens::{digest_token, OneTimeToken},
    },
    models::user::{normalize_email, CreateUser, Role, User, UserProfile},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

const INVALID_LOGIN: &str = "Invalid email or password";
const INVALID_TOKEN: &str = "Invalid token";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `"bearer"`
    pub token_type: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Register a new user
///
/// The role is always `user`. The account cannot log in until the emailed
/// link is followed.
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or the email is already registered
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let hashed_password =
        password::hash_password_blocking(req.password, state.config.auth.hash_cost).await?;
    let verification = OneTimeToken::generate();

    let user = User::create(
        &state.db,
        CreateUser {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            hashed_password,
            role: Role::User,
            verification_digest: Some(verification.digest),
        },
    )
    .await?;

    state.notifier.send_verification(&user.email, &verification.plaintext);
    info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// Log in
///
/// # Errors
///
/// - `400 Bad Request`: unknown email or wrong password (indistinguishable)
/// - `403 Forbidden`: the email has not been verified
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = User::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_LOGIN.to_string()))?;

    let matches = password::verify_password_blocking(req.password, user.hashed_password.clone()).await?;
    if !matches {
        info!(user_id = user.id, "Login rejected: wrong password");
        return Err(ApiError::BadRequest(INVALID_LOGIN.to_string()));
    }

    if !user.is_verified {
        return Err(ApiError::Forbidden("Please verify your email".to_string()));
    }

    let access_token = state.tokens.issue(user.id)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// Verify an email address
///
/// # Errors
///
/// - `400 Bad Request`: unknown or already consumed token
pub async fn verify_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TokenQuery>,
) -> ApiResult<Json<MessageResponse>> {
    let user = User::consume_verification_token(&state.db, &digest_token(query.token.trim()))
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_TOKEN.to_string()))?;

    info!(user_id = user.id, "Email verified");
    Ok(MessageResponse::new("Email verified successfully"))
}

/// Start a password reset
///
/// Any earlier outstanding reset token for the account is replaced.
///
/// # Errors
///
/// - `404 Not Found`: no account with that email
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = User::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let reset = OneTimeToken::generate();
    let expires_at = Utc::now() + state.config.password_reset_ttl();

    if !User::set_password_reset_token(&state.db, user.id, &reset.digest, expires_at).await? {
        warn!(user_id = user.id, "User vanished before reset token was stored");
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    state.notifier.send_password_reset(&user.email, &reset.plaintext);
    info!(user_id = user.id, "Password reset requested");

    Ok(MessageResponse::new("Reset email sent"))
}

/// Finish a password reset
///
/// # Errors
///
/// - `400 Bad Request`: unknown, consumed or expired token, or a too-short password
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let hashed_password =
        password::hash_password_blocking(req.new_password, state.config.auth.hash_cost).await?;

    let user = User::consume_password_reset_token(&state.db, &digest_token(req.token.trim()), &hashed_password)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_TOKEN.to_string()))?;

    info!(user_id = user.id, "Password reset");
    Ok(MessageResponse::new("Password reset successful"))
}
