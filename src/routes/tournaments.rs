use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dto::tournament::{
        CreateTournamentRequest, RenameTournamentRequest, TournamentDetails, TournamentListQuery,
        TournamentSummary,
    },
    error::{AppError, ErrorBody},
    routes::require_admin,
    services::tournament_service,
    state::{SharedState, tournament::TournamentId},
};

/// Public tournament views and the director's lifecycle endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    let admin = Router::new()
        .route("/api/admin/tournaments", post(create_tournament))
        .route("/api/admin/tournaments/{id}", patch(rename_tournament))
        .route("/api/admin/tournaments/{id}/finish", post(finish_tournament))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .route("/api/tournaments", get(list_tournaments))
        .route("/api/tournaments/{id}", get(get_tournament))
        .merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/tournaments",
    tag = "tournaments",
    params(TournamentListQuery),
    responses(
        (status = 200, description = "Tournaments ordered by identifier", body = [TournamentSummary]),
        (status = 503, description = "Storage unavailable", body = ErrorBody),
    )
)]
/// List tournaments, optionally filtered by status.
pub async fn list_tournaments(
    State(state): State<SharedState>,
    Query(query): Query<TournamentListQuery>,
) -> Result<Json<Vec<TournamentSummary>>, AppError> {
    Ok(Json(
        tournament_service::list(&state, query.status_filter()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/tournaments/{id}",
    tag = "tournaments",
    params(("id" = u64, Path, description = "Tournament identifier")),
    responses(
        (status = 200, description = "Tournament with live clock and players", body = TournamentDetails),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
    )
)]
/// Retrieve a tournament with its live snapshot and active players.
pub async fn get_tournament(
    State(state): State<SharedState>,
    Path(id): Path<TournamentId>,
) -> Result<Json<TournamentDetails>, AppError> {
    Ok(Json(tournament_service::details(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/tournaments",
    tag = "admin",
    security(("bearer" = [])),
    request_body = CreateTournamentRequest,
    responses(
        (status = 201, description = "Tournament created and its clock loaded", body = TournamentSummary),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    )
)]
/// Create a tournament and start ticking its clock.
pub async fn create_tournament(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateTournamentRequest>>,
) -> Result<(StatusCode, Json<TournamentSummary>), AppError> {
    let summary = tournament_service::create(&state, payload.name, payload.state_json).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/tournaments/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "Tournament identifier")),
    request_body = RenameTournamentRequest,
    responses(
        (status = 200, description = "Tournament renamed", body = TournamentSummary),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
    )
)]
/// Rename a tournament.
pub async fn rename_tournament(
    State(state): State<SharedState>,
    Path(id): Path<TournamentId>,
    Valid(Json(payload)): Valid<Json<RenameTournamentRequest>>,
) -> Result<Json<TournamentSummary>, AppError> {
    Ok(Json(
        tournament_service::rename(&state, id, &payload.name).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/tournaments/{id}/finish",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "Tournament identifier")),
    responses(
        (status = 200, description = "Tournament finished and unloaded", body = TournamentSummary),
        (status = 404, description = "Unknown tournament", body = ErrorBody),
        (status = 409, description = "Tournament already finished", body = ErrorBody),
    )
)]
/// Stop a tournament's clock for good and mark it finished.
pub async fn finish_tournament(
    State(state): State<SharedState>,
    Path(id): Path<TournamentId>,
) -> Result<Json<TournamentSummary>, AppError> {
    Ok(Json(tournament_service::finish(&state, id).await?))
}
