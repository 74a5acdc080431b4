use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    auth::Identity,
    dto::player::{PlayerEntry, PlayerProfile, PlayersQuery, RegisterRequest, UpdateNicknameRequest},
    error::{AppError, ErrorBody},
    routes::require_identity,
    services::registration_service,
    state::SharedState,
};

/// Player profile, registration and the public player list.
pub fn router(state: SharedState) -> Router<SharedState> {
    let authenticated = Router::new()
        .route("/api/me", get(get_me).patch(update_me))
        .route("/api/me/register", post(register))
        .route_layer(middleware::from_fn_with_state(state, require_identity));

    Router::new()
        .route("/api/players", get(list_players))
        .merge(authenticated)
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "players",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = PlayerProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    )
)]
/// Return the caller's profile, creating it on first use.
pub async fn get_me(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<PlayerProfile>, AppError> {
    Ok(Json(registration_service::me(&state, &identity).await?))
}

#[utoipa::path(
    patch,
    path = "/api/me",
    tag = "players",
    security(("bearer" = [])),
    request_body = UpdateNicknameRequest,
    responses(
        (status = 200, description = "Nickname updated", body = PlayerProfile),
        (status = 400, description = "Invalid nickname", body = ErrorBody),
    )
)]
/// Change the caller's nickname.
pub async fn update_me(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Valid(Json(payload)): Valid<Json<UpdateNicknameRequest>>,
) -> Result<Json<PlayerProfile>, AppError> {
    Ok(Json(
        registration_service::update_nickname(&state, &identity, &payload.nickname).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/me/register",
    tag = "players",
    security(("bearer" = [])),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Entry created or reactivated", body = PlayerEntry),
        (status = 200, description = "Already registered", body = PlayerEntry),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
        (status = 409, description = "Tournament finished or player active elsewhere", body = ErrorBody),
    )
)]
/// Register the caller in a tournament.
pub async fn register(
    State(state): State<SharedState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PlayerEntry>), AppError> {
    let registration =
        registration_service::register(&state, &identity, payload.tournament_id).await?;
    let status = if registration.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(registration.entry)))
}

#[utoipa::path(
    get,
    path = "/api/players",
    tag = "players",
    params(PlayersQuery),
    responses(
        (status = 200, description = "Entries in join order", body = [PlayerEntry]),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
    )
)]
/// List every entry of a tournament.
pub async fn list_players(
    State(state): State<SharedState>,
    Query(query): Query<PlayersQuery>,
) -> Result<Json<Vec<PlayerEntry>>, AppError> {
    Ok(Json(
        registration_service::list_players(&state, query.tournament_id).await?,
    ))
}
