use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{format_system_time, validation::validate_nickname};
use crate::{
    dao::models::{EntryEntity, PlayerEntity},
    state::tournament::{LEGACY_TOURNAMENT_ID, TournamentId},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Profile of the calling player.
pub struct PlayerProfile {
    /// Account name from the token.
    pub username: String,
    /// Display name.
    pub nickname: String,
    /// RFC 3339 time of the first visit.
    pub created_at: String,
    /// Open tournament the player is currently registered in, if any.
    pub active_tournament_id: Option<TournamentId>,
}

impl PlayerProfile {
    /// Build a profile from the stored player.
    pub fn new(player: PlayerEntity, active_tournament_id: Option<TournamentId>) -> Self {
        let nickname = display_name(&player);
        Self {
            username: player.username,
            nickname,
            created_at: format_system_time(player.created_at),
            active_tournament_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Registration of a player as listed for a tournament.
pub struct PlayerEntry {
    /// Tournament joined.
    pub tournament_id: TournamentId,
    /// Account name.
    pub username: String,
    /// Display name.
    pub nickname: String,
    /// False once the player busted out.
    pub is_active: bool,
    /// RFC 3339 registration time.
    pub joined_at: String,
}

impl PlayerEntry {
    /// Combine an entry with the player's display name.
    pub fn new(entry: EntryEntity, player: Option<&PlayerEntity>) -> Self {
        let nickname = player.map_or_else(|| entry.username.clone(), display_name);
        Self {
            tournament_id: entry.tournament_id,
            username: entry.username,
            nickname,
            is_active: entry.is_active,
            joined_at: format_system_time(entry.joined_at),
        }
    }
}

fn display_name(player: &PlayerEntity) -> String {
    if player.nickname.trim().is_empty() {
        player.username.clone()
    } else {
        player.nickname.clone()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload for `PATCH /api/me`.
pub struct UpdateNicknameRequest {
    /// New display name, trimmed.
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Payload for `POST /api/me/register`.
pub struct RegisterRequest {
    /// Tournament to join; the legacy tournament when absent.
    #[serde(default = "legacy_tournament_id", alias = "tournamentId")]
    pub tournament_id: TournamentId,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query parameters of `GET /api/players`.
pub struct PlayersQuery {
    /// Tournament to list; the legacy tournament when absent.
    #[serde(default = "legacy_tournament_id")]
    pub tournament_id: TournamentId,
}

fn legacy_tournament_id() -> TournamentId {
    LEGACY_TOURNAMENT_ID
}
