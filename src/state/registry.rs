//! Process-wide map of loaded tournament clocks.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;

use super::{
    clock::Snapshot,
    tournament::{TournamentId, TournamentState},
};
use crate::error::ServiceError;

/// Slot holding one clock; emptied when the tournament is unloaded so late callers see it gone.
type ClockSlot = Arc<Mutex<Option<TournamentState>>>;

/// Registry of in-memory tournament clocks.
///
/// Each clock sits behind its own mutex: mutations of one tournament are serialized while
/// different tournaments never contend. Map guards are released before any lock is awaited.
#[derive(Default)]
pub struct ClockRegistry {
    clocks: DashMap<TournamentId, ClockSlot>,
}

impl ClockRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `seed` (or the default state) for `id`.
    ///
    /// A clock that was running is resumed from `now_ms`: time spent while unloaded is not
    /// charged to the level. Re-initializing a loaded id replaces its contents in place.
    pub async fn initialize(
        &self,
        id: TournamentId,
        seed: Option<TournamentState>,
        now_ms: i64,
    ) {
        let mut clock = seed.unwrap_or_default();
        clock.normalize();
        if clock.running {
            clock.started_at_ms = Some(now_ms);
        }

        let slot = match self.clocks.entry(id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Some(clock))));
                return;
            }
        };
        *slot.lock().await = Some(clock);
    }

    fn slot(&self, id: TournamentId) -> Result<ClockSlot, ServiceError> {
        self.clocks
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServiceError::tournament_not_found(id))
    }

    /// Public view of a loaded clock.
    pub async fn read_snapshot(
        &self,
        id: TournamentId,
        now_ms: i64,
    ) -> Result<Snapshot, ServiceError> {
        self.read(id, |clock| clock.snapshot(now_ms)).await
    }

    /// Detached copy of a loaded clock, for persistence.
    pub async fn read_copy(&self, id: TournamentId) -> Result<TournamentState, ServiceError> {
        self.read(id, TournamentState::clone).await
    }

    async fn read<R>(
        &self,
        id: TournamentId,
        reader: impl FnOnce(&TournamentState) -> R,
    ) -> Result<R, ServiceError> {
        let slot = self.slot(id)?;
        let guard = slot.lock().await;
        guard
            .as_ref()
            .map(reader)
            .ok_or_else(|| ServiceError::tournament_not_found(id))
    }

    /// Run `mutator` with exclusive access to the clock of `id`.
    ///
    /// The closure is synchronous, so the lock is never held across I/O.
    pub async fn mutate<F, R>(&self, id: TournamentId, mutator: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut TournamentState) -> R,
    {
        let slot = self.slot(id)?;
        let mut guard = slot.lock().await;
        guard
            .as_mut()
            .map(mutator)
            .ok_or_else(|| ServiceError::tournament_not_found(id))
    }

    /// Unload a clock, returning its final state.
    pub async fn remove(&self, id: TournamentId) -> Option<TournamentState> {
        let (_, slot) = self.clocks.remove(&id)?;
        let mut guard = slot.lock().await;
        guard.take()
    }

    /// Whether `id` is loaded.
    pub fn contains(&self, id: TournamentId) -> bool {
        self.clocks.contains_key(&id)
    }

    /// Identifiers of every loaded clock.
    pub fn ids(&self) -> Vec<TournamentId> {
        self.clocks.iter().map(|entry| *entry.key()).collect()
    }
}
