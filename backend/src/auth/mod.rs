//! Credential handling: password hashes, session tokens and the cookie
//! that carries them.

pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{Claims, JwtKeys};
