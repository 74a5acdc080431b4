use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::state::tournament::TournamentId;

/// Lifecycle stage of a tournament row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Created, clock never moved.
    Pending,
    /// Clock started at least once.
    Running,
    /// Closed; never loaded again.
    Finished,
}

impl TournamentStatus {
    /// Lowercase name used in storage and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Pending => "pending",
            TournamentStatus::Running => "running",
            TournamentStatus::Finished => "finished",
        }
    }

    /// Whether tournaments in this status are loaded at boot and accept registrations.
    pub fn is_open(&self) -> bool {
        !matches!(self, TournamentStatus::Finished)
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TournamentStatus::Pending),
            "running" => Ok(TournamentStatus::Running),
            "finished" => Ok(TournamentStatus::Finished),
            _ => Err(()),
        }
    }
}

/// Durable tournament row; `state` holds the clock in its JSON layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentRecord {
    /// Sequential identifier.
    pub id: TournamentId,
    /// Display name.
    pub name: String,
    /// Lifecycle stage.
    pub status: TournamentStatus,
    /// Last saved clock state.
    pub state: Value,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last write time.
    pub updated_at: SystemTime,
}

/// Player profile keyed by the username carried in the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Account name, unique.
    pub username: String,
    /// Name shown on the clock; defaults to the username.
    pub nickname: String,
    /// First time the player was seen.
    pub created_at: SystemTime,
}

/// Registration of one player in one tournament.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEntity {
    /// Tournament joined.
    pub tournament_id: TournamentId,
    /// Player who joined.
    pub username: String,
    /// False once the player busted out.
    pub is_active: bool,
    /// Registration time.
    pub joined_at: SystemTime,
}
