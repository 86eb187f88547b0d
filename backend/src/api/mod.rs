pub mod auth;
pub mod server;
