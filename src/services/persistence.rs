//! Debounced write-behind of tournament clocks.
//!
//! Commands and ticks only mark a tournament dirty; the latest state is written once the
//! tournament has been quiet for the configured debounce. Save failures are logged and never
//! reach the caller that triggered them.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{task::AbortHandle, time::sleep};
use tracing::{debug, warn};

use crate::{
    dao::{models::TournamentStatus, tournament_store::TournamentStore},
    state::{
        SharedState,
        tournament::{TournamentId, TournamentState},
    },
};

/// Pending saves keyed by tournament; scheduling again restarts the quiet period.
pub struct SaveQueue {
    delay: Duration,
    generation: AtomicU64,
    pending: DashMap<TournamentId, (u64, AbortHandle)>,
}

impl SaveQueue {
    /// Queue writing each tournament `delay` after its last change.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
            pending: DashMap::new(),
        }
    }

    /// Save `id` once it has been quiet for the debounce, superseding any earlier request.
    pub fn schedule(&self, state: &SharedState, id: TournamentId) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let task_state = Arc::clone(state);

        // The entry guard is held until the handle is stored, so the task can never look itself
        // up before it is registered.
        let slot = self.pending.entry(id);
        let task = tokio::spawn(async move {
            sleep(delay).await;
            // Leave the queue before writing so a newer request cannot abort a save in flight.
            let still_current = task_state
                .saves()
                .pending
                .remove_if(&id, |_, (pending, _)| *pending == generation)
                .is_some();
            if still_current {
                persist_loaded(&task_state, id).await;
            }
        });

        match slot {
            Entry::Occupied(mut occupied) => {
                let (_, previous) = occupied.insert((generation, task.abort_handle()));
                previous.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert((generation, task.abort_handle()));
            }
        }
    }

    /// Drop a pending save for `id`, if any.
    pub fn cancel(&self, id: TournamentId) {
        if let Some((_, (_, handle))) = self.pending.remove(&id) {
            handle.abort();
        }
    }

    /// Whether a save for `id` is waiting for its quiet period to end.
    pub fn is_pending(&self, id: TournamentId) -> bool {
        self.pending.contains_key(&id)
    }
}

/// Write the loaded clock of `id` with its status hint.
async fn persist_loaded(state: &SharedState, id: TournamentId) {
    let Some(store) = state.store().await else {
        debug!(tournament_id = id, "no store installed; skipping save");
        return;
    };
    let Ok(clock) = state.clocks().read_copy(id).await else {
        debug!(tournament_id = id, "tournament unloaded before its save; skipping");
        return;
    };
    write_state(store.as_ref(), id, &clock, clock.status_hint()).await;
}

/// Write `clock` under `status`, logging instead of failing.
///
/// Returns whether the row was written.
pub async fn write_state(
    store: &dyn TournamentStore,
    id: TournamentId,
    clock: &TournamentState,
    status: TournamentStatus,
) -> bool {
    let value = match clock.to_value() {
        Ok(value) => value,
        Err(err) => {
            warn!(tournament_id = id, error = %err, "failed to serialize tournament state");
            return false;
        }
    };

    match store.save_state(id, value, status).await {
        Ok(true) => {
            debug!(tournament_id = id, %status, "tournament state saved");
            true
        }
        Ok(false) => {
            warn!(tournament_id = id, "tournament row missing; state not saved");
            false
        }
        Err(err) => {
            warn!(tournament_id = id, error = %err, "failed to save tournament state");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        auth::JwtVerifier,
        config::AppConfig,
        dao::tournament_store::memory::MemoryTournamentStore,
        state::{AppState, commands::Command},
    };

    const DEBOUNCE: Duration = Duration::from_millis(250);

    async fn fixture() -> (SharedState, Arc<MemoryTournamentStore>, TournamentId) {
        let state = AppState::new(
            AppConfig::default().with_save_debounce(DEBOUNCE),
            Arc::new(JwtVerifier::new("test")),
        );
        let store = Arc::new(MemoryTournamentStore::new());
        state.install_store(store.clone()).await;
        let record = store.create_tournament("T".into(), json!({})).await.unwrap();
        state.clocks().initialize(record.id, None, 0).await;
        (state, store, record.id)
    }

    async fn stored_rebuys(store: &MemoryTournamentStore, id: TournamentId) -> u64 {
        let record = store.find_tournament(id).await.unwrap().unwrap();
        TournamentState::from_value(&record.state).players.rebuy_count
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_write_of_the_latest_state() {
        let (state, store, id) = fixture().await;

        for _ in 0..3 {
            state
                .clocks()
                .mutate(id, |clock| clock.apply(Command::Rebuy, 0))
                .await
                .unwrap();
            state.saves().schedule(&state, id);
            sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(stored_rebuys(&store, id).await, 0);
        assert!(state.saves().is_pending(id));

        sleep(DEBOUNCE).await;
        assert_eq!(stored_rebuys(&store, id).await, 3);
        assert!(!state.saves().is_pending(id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_saves_never_land() {
        let (state, store, id) = fixture().await;
        state
            .clocks()
            .mutate(id, |clock| clock.apply(Command::Rebuy, 0))
            .await
            .unwrap();
        state.saves().schedule(&state, id);
        state.saves().cancel(id);

        sleep(DEBOUNCE * 4).await;
        assert_eq!(stored_rebuys(&store, id).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_store_is_not_an_error() {
        let (state, _store, id) = fixture().await;
        state.clear_store().await;
        state.saves().schedule(&state, id);
        sleep(DEBOUNCE * 2).await;
        assert!(state.is_degraded());
    }
}
