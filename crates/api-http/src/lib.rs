//! HTTP API Layer
//!
//! Exposes submission and result polling over axum, with bearer-token
//! sessions verified before any request body is read.

pub mod auth;
pub mod error;
pub mod handler;
pub mod server;
pub mod state;
pub mod types;

pub use auth::{encode_session_token, JwtSessionVerifier, SessionClaims};
pub use server::{router, serve, HttpServerConfig};
pub use state::AppState;
