use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB backend, each naming the operation that failed.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to allocate a tournament identifier")]
    NextId {
        #[source]
        source: MongoError,
    },
    #[error("stored tournament identifier `{id}` is negative")]
    NegativeId { id: i64 },
    #[error("failed to save tournament `{id}`")]
    SaveTournament {
        id: u64,
        #[source]
        source: MongoError,
    },
    #[error("failed to load tournament `{id}`")]
    LoadTournament {
        id: u64,
        #[source]
        source: MongoError,
    },
    #[error("failed to list tournaments")]
    ListTournaments {
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{username}`")]
    SavePlayer {
        username: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{username}`")]
    LoadPlayer {
        username: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save entry of `{username}` in tournament `{tournament_id}`")]
    SaveEntry {
        tournament_id: u64,
        username: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load entries")]
    LoadEntries {
        #[source]
        source: MongoError,
    },
}
