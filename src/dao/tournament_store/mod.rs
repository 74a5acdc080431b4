/// In-process store.
pub mod memory;
/// MongoDB store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dao::models::{EntryEntity, PlayerEntity, TournamentRecord, TournamentStatus};
use crate::dao::storage::StorageResult;
use crate::state::tournament::TournamentId;

/// Abstraction over the persistence layer for tournaments, players and their entries.
///
/// Saving state never moves a finished tournament back to another status.
pub trait TournamentStore: Send + Sync {
    /// Insert a pending tournament under the next free identifier.
    fn create_tournament(
        &self,
        name: String,
        state: Value,
    ) -> BoxFuture<'static, StorageResult<TournamentRecord>>;
    fn find_tournament(
        &self,
        id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>>;
    /// Tournaments ordered by identifier, optionally restricted to one status.
    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentRecord>>>;
    /// Overwrite the clock state and status; `false` when the row does not exist.
    fn save_state(
        &self,
        id: TournamentId,
        state: Value,
        status: TournamentStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn rename_tournament(
        &self,
        id: TournamentId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>>;
    fn find_player(&self, username: String)
    -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_entry(
        &self,
        tournament_id: TournamentId,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<EntryEntity>>>;
    /// Active entries of a player across every tournament.
    fn active_entries(&self, username: String)
    -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>>;
    /// Insert or replace the entry keyed by tournament and username.
    fn save_entry(&self, entry: EntryEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Entries of a tournament in join order.
    fn list_entries(
        &self,
        tournament_id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
