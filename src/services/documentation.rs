use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the poker clock server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::tournaments::list_tournaments,
        crate::routes::tournaments::get_tournament,
        crate::routes::tournaments::create_tournament,
        crate::routes::tournaments::rename_tournament,
        crate::routes::tournaments::finish_tournament,
        crate::routes::players::get_me,
        crate::routes::players::update_me,
        crate::routes::players::register,
        crate::routes::players::list_players,
        crate::routes::websocket::clock_socket,
        crate::routes::websocket::legacy_clock_socket,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::tournament::TournamentSummary,
            crate::dto::tournament::TournamentDetails,
            crate::dto::tournament::CreateTournamentRequest,
            crate::dto::tournament::RenameTournamentRequest,
            crate::dto::player::PlayerProfile,
            crate::dto::player::PlayerEntry,
            crate::dto::player::UpdateNicknameRequest,
            crate::dto::player::RegisterRequest,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::SoundType,
            crate::dao::models::TournamentStatus,
            crate::error::ErrorBody,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tournaments", description = "Public tournament views"),
        (name = "admin", description = "Tournament lifecycle for directors"),
        (name = "players", description = "Player profiles and registration"),
        (name = "clock", description = "WebSocket clock sessions"),
    )
)]
/// OpenAPI document of the REST and WebSocket surface.
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by authenticated operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
