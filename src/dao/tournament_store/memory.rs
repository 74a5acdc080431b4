use std::{
    collections::{BTreeMap, HashMap},
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::RwLock;

use super::TournamentStore;
use crate::{
    dao::{
        models::{EntryEntity, PlayerEntity, TournamentRecord, TournamentStatus},
        storage::{StorageError, StorageResult},
    },
    state::tournament::TournamentId,
};

/// Process-local store used when no database is configured.
///
/// Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryTournamentStore {
    inner: Arc<RwLock<MemoryInner>>,
    read_only: Arc<AtomicBool>,
}

#[derive(Default)]
struct MemoryInner {
    last_id: TournamentId,
    tournaments: BTreeMap<TournamentId, TournamentRecord>,
    players: HashMap<String, PlayerEntity>,
    entries: Vec<EntryEntity>,
}

impl MemoryTournamentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with [`StorageError::Unavailable`] while reads keep working.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn writable(&self) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "store is read-only".into(),
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(())
    }
}

impl TournamentStore for MemoryTournamentStore {
    fn create_tournament(
        &self,
        name: String,
        state: Value,
    ) -> BoxFuture<'static, StorageResult<TournamentRecord>> {
        let writable = self.writable();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            writable?;
            let mut guard = inner.write().await;
            guard.last_id += 1;
            let now = SystemTime::now();
            let record = TournamentRecord {
                id: guard.last_id,
                name,
                status: TournamentStatus::Pending,
                state,
                created_at: now,
                updated_at: now,
            };
            guard.tournaments.insert(record.id, record.clone());
            Ok(record)
        })
    }

    fn find_tournament(
        &self,
        id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { Ok(inner.read().await.tournaments.get(&id).cloned()) })
    }

    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<TournamentRecord>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(guard
                .tournaments
                .values()
                .filter(|record| status.is_none_or(|status| record.status == status))
                .cloned()
                .collect())
        })
    }

    fn save_state(
        &self,
        id: TournamentId,
        state: Value,
        status: TournamentStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let writable = self.writable();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            writable?;
            let mut guard = inner.write().await;
            let Some(record) = guard.tournaments.get_mut(&id) else {
                return Ok(false);
            };
            if record.status == TournamentStatus::Finished && status != TournamentStatus::Finished {
                return Ok(true);
            }
            record.state = state;
            record.status = status;
            record.updated_at = SystemTime::now();
            Ok(true)
        })
    }

    fn rename_tournament(
        &self,
        id: TournamentId,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentRecord>>> {
        let writable = self.writable();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            writable?;
            let mut guard = inner.write().await;
            Ok(guard.tournaments.get_mut(&id).map(|record| {
                record.name = name;
                record.updated_at = SystemTime::now();
                record.clone()
            }))
        })
    }

    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { Ok(inner.read().await.players.get(&username).cloned()) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let writable = self.writable();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            writable?;
            inner
                .write()
                .await
                .players
                .insert(player.username.clone(), player);
            Ok(())
        })
    }

    fn find_entry(
        &self,
        tournament_id: TournamentId,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<EntryEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .entries
                .iter()
                .find(|entry| entry.tournament_id == tournament_id && entry.username == username)
                .cloned())
        })
    }

    fn active_entries(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            Ok(inner
                .read()
                .await
                .entries
                .iter()
                .filter(|entry| entry.is_active && entry.username == username)
                .cloned()
                .collect())
        })
    }

    fn save_entry(&self, entry: EntryEntity) -> BoxFuture<'static, StorageResult<()>> {
        let writable = self.writable();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            writable?;
            let mut guard = inner.write().await;
            let position = guard.entries.iter().position(|existing| {
                existing.tournament_id == entry.tournament_id && existing.username == entry.username
            });
            match position {
                Some(index) => guard.entries[index] = entry,
                None => guard.entries.push(entry),
            }
            Ok(())
        })
    }

    fn list_entries(
        &self,
        tournament_id: TournamentId,
    ) -> BoxFuture<'static, StorageResult<Vec<EntryEntity>>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut entries: Vec<_> = inner
                .read()
                .await
                .entries
                .iter()
                .filter(|entry| entry.tournament_id == tournament_id)
                .cloned()
                .collect();
            entries.sort_by_key(|entry| entry.joined_at);
            Ok(entries)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
