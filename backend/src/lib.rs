//! Account registration, login and cookie-based sessions over a JSON API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod telemetry;
