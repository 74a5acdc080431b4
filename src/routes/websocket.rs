use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    services::websocket_service,
    state::{
        SharedState,
        tournament::{LEGACY_TOURNAMENT_ID, TournamentId},
    },
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query parameters of the clock WebSocket.
pub struct ClockSocketQuery {
    /// Access token; the connection is closed with code 4001 when it is missing or invalid.
    pub token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws/clock/{tournament_id}",
    tag = "clock",
    params(
        ("tournament_id" = u64, Path, description = "Tournament to observe"),
        ClockSocketQuery,
    ),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a clock observer session for one tournament.
pub async fn clock_socket(
    State(state): State<SharedState>,
    Path(tournament_id): Path<TournamentId>,
    Query(query): Query<ClockSocketQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(state, socket, tournament_id, query.token)
    })
}

#[utoipa::path(
    get,
    path = "/ws/clock",
    tag = "clock",
    params(ClockSocketQuery),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Clock session for the single-tournament clients, bound to tournament 1.
pub async fn legacy_clock_socket(
    State(state): State<SharedState>,
    Query(query): Query<ClockSocketQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(state, socket, LEGACY_TOURNAMENT_ID, query.token)
    })
}

/// Configure the clock WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws/clock", get(legacy_clock_socket))
        .route("/ws/clock/{tournament_id}", get(clock_socket))
}
