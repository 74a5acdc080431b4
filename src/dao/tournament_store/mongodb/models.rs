use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{EntryEntity, PlayerEntity, TournamentRecord, TournamentStatus},
    state::tournament::TournamentId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTournamentDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub status: TournamentStatus,
    #[serde(default)]
    pub state: Value,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCounterDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub username: String,
    pub nickname: String,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEntryDocument {
    pub tournament_id: i64,
    pub username: String,
    pub is_active: bool,
    pub joined_at: DateTime,
}

/// Identifiers are sequential and never come close to `i64::MAX`.
pub fn bson_id(id: TournamentId) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn tournament_id(id: i64) -> MongoResult<TournamentId> {
    TournamentId::try_from(id).map_err(|_| MongoDaoError::NegativeId { id })
}

impl TryFrom<MongoTournamentDocument> for TournamentRecord {
    type Error = MongoDaoError;

    fn try_from(value: MongoTournamentDocument) -> MongoResult<Self> {
        Ok(Self {
            id: tournament_id(value.id)?,
            name: value.name,
            status: value.status,
            state: value.state,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

impl From<TournamentRecord> for MongoTournamentDocument {
    fn from(value: TournamentRecord) -> Self {
        Self {
            id: bson_id(value.id),
            name: value.name,
            status: value.status,
            state: value.state,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            username: value.username,
            nickname: value.nickname,
            created_at: value.created_at.to_system_time(),
        }
    }
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            username: value.username,
            nickname: value.nickname,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoEntryDocument> for EntryEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoEntryDocument) -> MongoResult<Self> {
        Ok(Self {
            tournament_id: tournament_id(value.tournament_id)?,
            username: value.username,
            is_active: value.is_active,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

impl From<EntryEntity> for MongoEntryDocument {
    fn from(value: EntryEntity) -> Self {
        Self {
            tournament_id: bson_id(value.tournament_id),
            username: value.username,
            is_active: value.is_active,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}
