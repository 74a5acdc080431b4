//! Tournament lifecycle: create, load at boot, finish, and the read-side REST views.

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    dao::models::{TournamentRecord, TournamentStatus},
    dto::{
        tournament::{TournamentDetails, TournamentSummary},
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{persistence::write_state, registration_service},
    state::{
        SharedState,
        clock::now_ms,
        commands::Command,
        tournament::{Structure, TournamentId, TournamentState},
    },
};

/// Persist a new pending tournament, load its clock and start ticking it.
///
/// `seed` is a clock in its stored layout; the built-in structure is used when it is absent or
/// not a non-empty object.
pub async fn create(
    state: &SharedState,
    name: Option<String>,
    seed: Option<Value>,
) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;
    let name = name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| state.config().default_tournament_name().to_owned());

    let clock = match seed {
        Some(seed) if seed.as_object().is_some_and(|fields| !fields.is_empty()) => {
            TournamentState::from_value(&seed)
        }
        _ => TournamentState::new(Structure::named(name.clone())),
    };
    let value = clock
        .to_value()
        .map_err(|err| ServiceError::Internal(format!("failed to serialize state: {err}")))?;

    let record = store.create_tournament(name, value).await?;
    load(state, &record).await;
    info!(tournament_id = record.id, name = %record.name, "tournament created");
    Ok(record.into())
}

/// Load the clock stored in `record` and start its ticker.
async fn load(state: &SharedState, record: &TournamentRecord) {
    let clock = TournamentState::from_value(&record.state);
    state
        .clocks()
        .initialize(record.id, Some(clock), now_ms())
        .await;
    state.tickers().start(state, record.id);
}

/// Load every tournament that is not finished and not already in memory.
///
/// An empty store gets the default tournament so single-tournament clients keep working.
/// Returns how many tournaments were loaded.
pub async fn restore_active(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_store().await?;
    flush_endings(state).await;
    let records = store.list_tournaments(None).await?;

    if records.is_empty() {
        info!("no tournaments stored; creating the default tournament");
        create(state, None, None).await?;
        return Ok(1);
    }

    let mut loaded = 0;
    for record in records.iter().filter(|record| record.status.is_open()) {
        if state.clocks().contains(record.id) || state.has_unsaved_ending(record.id) {
            continue;
        }
        load(state, record).await;
        loaded += 1;
    }

    info!(loaded, "active tournaments restored");
    Ok(loaded)
}

/// Unload a tournament whose last level expired and store it as finished.
///
/// Called from its own ticker, which stops by itself afterwards. When the write fails the final
/// clock is held and retried by [`flush_endings`].
pub async fn retire_ended(state: &SharedState, id: TournamentId) {
    state.saves().cancel(id);
    let Some(clock) = state.clocks().remove(id).await else {
        return;
    };
    state.hold_ending(id, clock);
    flush_endings(state).await;
}

/// Store every held ending as finished; returns how many are still waiting.
pub async fn flush_endings(state: &SharedState) -> usize {
    let endings = state.unsaved_endings();
    if endings.is_empty() {
        return 0;
    }
    let Some(store) = state.store().await else {
        warn!(waiting = endings.len(), "no store installed; final states kept for later");
        return endings.len();
    };

    let mut waiting = 0;
    for (id, clock) in endings {
        if write_state(store.as_ref(), id, &clock, TournamentStatus::Finished).await {
            state.release_ending(id);
            info!(tournament_id = id, "final state stored");
        } else {
            waiting += 1;
        }
    }
    waiting
}

/// Close a tournament on the director's request.
///
/// The clock is paused and stored as finished, then unloaded. When the write fails the
/// tournament stays loaded (paused) and keeps ticking.
pub async fn finish(
    state: &SharedState,
    id: TournamentId,
) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;
    let record = store
        .find_tournament(id)
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(id))?;
    if record.status == TournamentStatus::Finished {
        return Err(ServiceError::InvalidState(format!(
            "tournament `{id}` is already finished"
        )));
    }

    let now = now_ms();
    let paused = state
        .clocks()
        .mutate(id, |clock| {
            clock.apply(Command::Pause, now);
            (clock.clone(), clock.snapshot(now))
        })
        .await
        .ok();
    let loaded = paused.is_some();
    let clock = match paused {
        Some((clock, snapshot)) => {
            state.hub().publish(id, &ServerMessage::Snapshot(snapshot));
            clock
        }
        None => TournamentState::from_value(&record.state),
    };

    let value = clock
        .to_value()
        .map_err(|err| ServiceError::Internal(format!("failed to serialize state: {err}")))?;
    if let Err(err) = store.save_state(id, value, TournamentStatus::Finished).await {
        if loaded {
            state.saves().schedule(state, id);
        }
        return Err(err.into());
    }

    state.tickers().stop(id);
    state.saves().cancel(id);
    state.clocks().remove(id).await;
    state.release_ending(id);
    info!(tournament_id = id, "tournament finished");

    let record = store
        .find_tournament(id)
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(id))?;
    Ok(record.into())
}

/// Tournaments ordered by identifier, optionally filtered by status.
pub async fn list(
    state: &SharedState,
    status: Option<TournamentStatus>,
) -> Result<Vec<TournamentSummary>, ServiceError> {
    let store = state.require_store().await?;
    let records = store.list_tournaments(status).await?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// Row, live snapshot and active players of one tournament.
pub async fn details(
    state: &SharedState,
    id: TournamentId,
) -> Result<TournamentDetails, ServiceError> {
    let store = state.require_store().await?;
    let record = store
        .find_tournament(id)
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(id))?;

    let snapshot = state.clocks().read_snapshot(id, now_ms()).await.ok();
    let players = registration_service::entries_with_nicknames(store.as_ref(), id)
        .await?
        .into_iter()
        .filter(|entry| entry.is_active)
        .collect();

    Ok(TournamentDetails {
        tournament: record.into(),
        snapshot,
        players,
    })
}

/// Change the display name of a tournament row.
pub async fn rename(
    state: &SharedState,
    id: TournamentId,
    name: &str,
) -> Result<TournamentSummary, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("name must not be blank".into()));
    }

    let store = state.require_store().await?;
    let record = store
        .rename_tournament(id, name.to_owned())
        .await?
        .ok_or_else(|| ServiceError::tournament_not_found(id))?;
    info!(tournament_id = id, name = %record.name, "tournament renamed");
    Ok(record.into())
}
