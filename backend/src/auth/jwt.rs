//! Session tokens.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::Error as JwtError, get_current_timestamp,
};
use serde::{Deserialize, Serialize};

use crate::db::models::User;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    pub name: String,
    pub email: String,
    /// Issued at, unix seconds.
    pub iat: u64,
    /// Expiry, unix seconds.
    pub exp: u64,
}

/// HS256 signing material plus the lifetime given to new tokens.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<Inner>,
}

struct Inner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                lifetime,
            }),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.inner.lifetime
    }

    pub fn issue(&self, user: &User) -> Result<String, JwtError> {
        self.issue_at(user, get_current_timestamp())
    }

    pub(crate) fn issue_at(&self, user: &User, iat: u64) -> Result<String, JwtError> {
        let claims = Claims {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            iat,
            exp: iat.saturating_add(self.inner.lifetime.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
    }

    /// Decode `token`, checking signature, algorithm and expiry with no leeway.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.inner.decoding, &validation)?;
        Ok(data.claims)
    }
}
