use std::fmt;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_NAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

/// A stored account row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// The view of a user that leaves the server. Never carries the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please provide name")]
    MissingName,
    #[error("Name must be at most 50 characters")]
    NameTooLong,
    #[error("Please provide email")]
    MissingEmail,
    #[error("Please provide a valid email")]
    InvalidEmail,
    #[error("Please provide password")]
    MissingPassword,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
}

/// Registration input that passed validation.
///
/// ## Invariants
/// - `name` is trimmed, non-empty and at most [`MAX_NAME_LEN`] characters.
/// - `email` is trimmed, lower-cased and shaped like `local@domain.tld`.
/// - `password` has at least [`MIN_PASSWORD_LEN`] characters and is kept
///   exactly as given.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    name: String,
    email: String,
    password: String,
}

impl NewUser {
    pub fn new(name: &str, email: &str, password: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong);
        }

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail);
        }

        if password.is_empty() {
            return Err(ValidationError::MissingPassword);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }

        Ok(Self {
            name: name.to_owned(),
            email,
            password: password.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Turn validated input into a row ready for insertion.
    pub fn into_user(self, password_hash: String) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            email: self.email,
            password_hash,
            created_at: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Emails are compared case-insensitively, so they are stored lower-cased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
