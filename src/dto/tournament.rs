use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{format_system_time, player::PlayerEntry, validation::validate_not_blank};
use crate::{
    dao::models::{TournamentRecord, TournamentStatus},
    state::{clock::Snapshot, tournament::TournamentId},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Tournament row as listed by the REST API.
pub struct TournamentSummary {
    /// Sequential identifier.
    pub id: TournamentId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: TournamentStatus,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last write.
    pub updated_at: String,
}

impl From<TournamentRecord> for TournamentSummary {
    fn from(record: TournamentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            status: record.status,
            created_at: format_system_time(record.created_at),
            updated_at: format_system_time(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Tournament row with its live clock and registered players.
pub struct TournamentDetails {
    /// Row fields.
    #[serde(flatten)]
    pub tournament: TournamentSummary,
    /// Live snapshot; `null` when the clock is not loaded (finished tournaments).
    pub snapshot: Option<Snapshot>,
    /// Players holding an active entry, in join order.
    pub players: Vec<PlayerEntry>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload for `POST /api/admin/tournaments`.
pub struct CreateTournamentRequest {
    /// Display name; the configured default is used when absent.
    #[validate(length(max = 255), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    /// Initial clock state in its stored layout; the built-in structure is used when absent.
    #[serde(default, alias = "state_json")]
    #[schema(value_type = Option<Object>)]
    pub state_json: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload for `PATCH /api/admin/tournaments/{id}`.
pub struct RenameTournamentRequest {
    /// New display name.
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query parameters of `GET /api/tournaments`.
pub struct TournamentListQuery {
    /// `pending`, `running` or `finished`; any other value lists everything.
    pub status: Option<String>,
}

impl TournamentListQuery {
    /// Status filter, ignoring unknown values.
    pub fn status_filter(&self) -> Option<TournamentStatus> {
        self.status.as_deref().and_then(|status| status.parse().ok())
    }
}
