mod config;
mod connection;
mod error;
mod models;
/// Store implementation.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoTournamentStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::NegativeId { .. } => StorageError::Corrupt(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
