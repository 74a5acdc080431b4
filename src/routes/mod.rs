use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    auth::{Identity, bearer_token},
    error::AppError,
    state::SharedState,
};

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Health check route.
pub mod health;
/// Player profile and registration routes.
pub mod players;
/// Tournament listing and admin lifecycle routes.
pub mod tournaments;
/// Clock WebSocket upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(tournaments::router(state.clone()))
        .merge(players::router(state.clone()))
        .merge(docs::router());

    api_router.with_state(state)
}

/// Resolve the bearer token of `req` into an identity.
fn identify(state: &SharedState, req: &Request<Body>) -> Result<Identity, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
    state
        .verifier()
        .verify(token)
        .ok_or_else(|| AppError::Unauthorized("invalid or expired token".into()))
}

/// Reject requests without a valid token and expose the caller as an [`Identity`] extension.
async fn require_identity(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = identify(&state, &req)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Like [`require_identity`], additionally requiring the admin role.
async fn require_admin(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = identify(&state, &req)?;
    if !identity.is_admin() {
        return Err(AppError::Forbidden("admin role required".into()));
    }
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
