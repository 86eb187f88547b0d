//! Account handlers.
//!
//! ```text
//! POST /api/v1/auth/register {"name":"Ada","email":"ada@example.com","password":"secret1"}
//! POST /api/v1/auth/login    {"email":"ada@example.com","password":"secret1"}
//! GET  /api/v1/auth/logout
//! GET  /api/v1/auth/user
//! ```

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::server::AppState;
use crate::auth::{password, session};
use crate::db::models::{NewUser, PublicUser, ValidationError, normalize_email};
use crate::db::repo;
use crate::error::{ApiResult, AppError};

const EMAIL_TAKEN: &str = "An account with this email already exists! Please, log in or use a different email to sign up.";
const INVALID_CREDENTIALS: &str =
    "Invalid credentials! Please, check your email and password and try again.";
const INCORRECT_PASSWORD: &str = "Incorrect password!";
const MISSING_CREDENTIALS: &str = "Please provide email and password";
const AUTHENTICATION_INVALID: &str = "Authentication invalid";

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl TryFrom<RegisterRequest> for NewUser {
    type Error = ValidationError;

    fn try_from(value: RegisterRequest) -> Result<Self, Self::Error> {
        Self::new(
            value.name.as_deref().unwrap_or_default(),
            value.email.as_deref().unwrap_or_default(),
            value.password.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: &'static str,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let Json(payload) = payload?;
    let new_user = NewUser::try_from(payload)?;

    if repo::find_user_by_email(&state.db, new_user.email()).await?.is_some() {
        return Err(AppError::bad_request(EMAIL_TAKEN));
    }

    let password_hash = password::hash_in_background(new_user.password().to_owned()).await?;
    let user = new_user.into_user(password_hash);

    // The lookup above races with concurrent sign-ups; the unique index decides.
    if let Err(err) = repo::insert_user(&state.db, &user).await {
        if repo::is_unique_violation(&err) {
            return Err(AppError::bad_request(EMAIL_TAKEN));
        }
        return Err(err.into());
    }

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user: PublicUser::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(SignedCookieJar, Json<UserResponse>)> {
    let Json(payload) = payload?;
    let email = payload
        .email
        .as_deref()
        .map(normalize_email)
        .unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request(MISSING_CREDENTIALS));
    }

    let Some(user) = repo::find_user_by_email(&state.db, &email).await? else {
        warn!("login rejected: unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !password::verify_in_background(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login rejected: incorrect password");
        return Err(AppError::unauthorized(INCORRECT_PASSWORD));
    }

    let token = state.jwt.issue(&user)?;
    let jar = session::start_session(jar, token, state.jwt.lifetime(), state.secure_cookies);

    info!(user_id = %user.id, "login succeeded");
    Ok((
        jar,
        Json(UserResponse {
            user: PublicUser::from(&user),
        }),
    ))
}

pub async fn logout(jar: SignedCookieJar) -> (SignedCookieJar, Json<MessageResponse>) {
    (
        session::clear_session(jar),
        Json(MessageResponse {
            msg: "User logged out!",
        }),
    )
}

/// The signed-in user, or `null` when the request carries no session.
pub async fn current_user(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> ApiResult<Json<Option<PublicUser>>> {
    let Some(token) = session::session_token(&jar) else {
        return Ok(Json(None));
    };

    let claims = state.jwt.verify(&token).map_err(|err| {
        debug!(error = %err, "session token rejected");
        AppError::unauthorized(AUTHENTICATION_INVALID)
    })?;

    let Some(user) = repo::find_user_by_id(&state.db, &claims.id).await? else {
        warn!(user_id = %claims.id, "session refers to a missing user");
        return Err(AppError::unauthorized(AUTHENTICATION_INVALID));
    };

    Ok(Json(Some(PublicUser::from(&user))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_register_fields_read_as_empty() {
        let err = NewUser::try_from(RegisterRequest::default()).expect_err("must fail");
        assert_eq!(err, ValidationError::MissingName);
    }

    #[test]
    fn register_request_maps_to_new_user() {
        let request = RegisterRequest {
            name: Some("Ada".into()),
            email: Some("ADA@example.com".into()),
            password: Some("secret1".into()),
        };
        let user = NewUser::try_from(request).expect("valid");
        assert_eq!(user.email(), "ada@example.com");
    }

    #[test]
    fn login_request_tolerates_missing_fields() {
        let request: LoginRequest = serde_json::from_str("{}").expect("parse");
        assert!(request.email.is_none());
        assert!(request.password.is_none());
    }
}
