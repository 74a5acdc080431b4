//! Library crate for poker-clock-back, exposing modules for binaries and integration tests.

/// Access-token verification.
pub mod auth;
/// Runtime configuration.
pub mod config;
/// Durable storage.
pub mod dao;
/// Wire types of the REST and WebSocket APIs.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Application services.
pub mod services;
/// In-memory state.
pub mod state;
