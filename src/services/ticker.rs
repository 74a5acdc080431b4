//! One background task per loaded tournament, advancing expired levels and broadcasting ticks.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    task::AbortHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info};

use crate::{
    dto::ws::{ServerMessage, SoundType},
    services::tournament_service,
    state::{
        SharedState,
        clock::{ClockEvent, now_ms},
        tournament::TournamentId,
    },
};

/// Interval between two ticks of a tournament.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
/// Remaining whole seconds at which the one-minute warning sounds.
const ONE_MINUTE_LEFT: i64 = 60;

/// Whether a ticker keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    /// Keep ticking.
    Continue,
    /// The tournament is gone or has ended.
    Stop,
}

/// Registry of running tickers; at most one per tournament.
pub struct TickScheduler {
    period: Duration,
    generation: AtomicU64,
    tasks: DashMap<TournamentId, (u64, AbortHandle)>,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl TickScheduler {
    /// Scheduler ticking every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            generation: AtomicU64::new(0),
            tasks: DashMap::new(),
        }
    }

    /// Start ticking `id`; does nothing when a ticker already runs for it.
    pub fn start(&self, state: &SharedState, id: TournamentId) {
        let Entry::Vacant(slot) = self.tasks.entry(id) else {
            return;
        };
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(run(Arc::clone(state), id, generation, self.period));
        slot.insert((generation, task.abort_handle()));
        info!(tournament_id = id, "clock ticker started");
    }

    /// Stop the ticker of `id`, if any.
    pub fn stop(&self, id: TournamentId) {
        if let Some((_, (_, handle))) = self.tasks.remove(&id) {
            handle.abort();
            info!(tournament_id = id, "clock ticker stopped");
        }
    }

    /// Whether a ticker runs for `id`.
    pub fn is_running(&self, id: TournamentId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Forget the finished task `generation` of `id`; a newer ticker for the id is kept.
    fn release(&self, id: TournamentId, generation: u64) {
        self.tasks.remove_if(&id, |_, (current, _)| *current == generation);
    }
}

async fn run(state: SharedState, id: TournamentId, generation: u64, period: Duration) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        if tick_once(&state, id, now_ms()).await == TickFlow::Stop {
            break;
        }
    }

    state.tickers().release(id, generation);
    info!(tournament_id = id, "clock ticker finished");
}

/// Run a single tick of `id` at `now_ms`.
///
/// Expired levels are advanced (at most one per tick) and announced with a snapshot, a system
/// event and a sound; otherwise observers get a `tick` and, while running, the one-minute warning.
/// The tournament is torn down when its last level ends.
pub async fn tick_once(state: &SharedState, id: TournamentId, now_ms: i64) -> TickFlow {
    let outcome = state
        .clocks()
        .mutate(id, |clock| {
            let event = clock.advance_if_expired(now_ms);
            (event, clock.snapshot(now_ms))
        })
        .await;

    let Ok((event, snapshot)) = outcome else {
        debug!(tournament_id = id, "tournament no longer loaded; stopping ticker");
        return TickFlow::Stop;
    };
    let hub = state.hub();

    let Some(event) = event else {
        let warn_one_minute =
            snapshot.running && snapshot.timing.remaining as i64 == ONE_MINUTE_LEFT;
        hub.publish(id, &ServerMessage::Tick(snapshot));
        if warn_one_minute {
            hub.publish(
                id,
                &ServerMessage::PlaySound {
                    sound_type: SoundType::OneMinuteLeft,
                },
            );
        }
        return TickFlow::Continue;
    };

    let level = snapshot.current_index;
    hub.publish(id, &ServerMessage::Snapshot(snapshot));
    hub.publish(id, &ServerMessage::SystemEvent { event });
    hub.publish(
        id,
        &ServerMessage::PlaySound {
            sound_type: SoundType::LevelAdvance,
        },
    );

    if event == ClockEvent::TournamentEnded {
        info!(tournament_id = id, "last level expired; tournament ended");
        tournament_service::retire_ended(state, id).await;
        TickFlow::Stop
    } else {
        info!(tournament_id = id, level, "level advanced");
        state.saves().schedule(state, id);
        TickFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        auth::JwtVerifier,
        config::AppConfig,
        dao::{
            models::TournamentStatus,
            tournament_store::{TournamentStore, memory::MemoryTournamentStore},
        },
        state::{
            AppState,
            broadcast::Observer,
            tournament::{Level, Structure, TournamentState},
        },
    };

    const T0: i64 = 1_700_000_000_000;

    async fn fixture(
        levels: Vec<Level>,
    ) -> (
        SharedState,
        Arc<MemoryTournamentStore>,
        TournamentId,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let state = AppState::new(AppConfig::default(), Arc::new(JwtVerifier::new("test")));
        let store = Arc::new(MemoryTournamentStore::new());
        state.install_store(store.clone()).await;

        let mut structure = Structure::default();
        structure.levels = levels;
        let seed = TournamentState::new(structure);
        let record = store
            .create_tournament("T".into(), seed.to_value().unwrap())
            .await
            .unwrap();
        state.clocks().initialize(record.id, Some(seed), T0).await;

        let (tx, rx) = mpsc::unbounded_channel();
        state.hub().join(
            record.id,
            Observer {
                id: Uuid::new_v4(),
                tx,
            },
        );
        (state, store, record.id, rx)
    }

    fn level(seconds: f64) -> Level {
        Level::Level {
            title: "L".into(),
            sb: 1,
            bb: 2,
            ante: 0,
            seconds: Some(seconds),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn quiet_tick_broadcasts_tick_only() {
        let (state, _store, id, mut rx) = fixture(vec![level(600.0)]).await;
        assert_eq!(tick_once(&state, id, T0).await, TickFlow::Continue);

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "tick");
        assert_eq!(frames[0]["timing"]["remaining"], 600.0);
    }

    #[tokio::test]
    async fn one_minute_warning_fires_while_running() {
        let (state, _store, id, mut rx) = fixture(vec![level(120.0)]).await;
        state
            .clocks()
            .mutate(id, |clock| {
                clock.running = true;
                clock.started_at_ms = Some(T0);
            })
            .await
            .unwrap();

        tick_once(&state, id, T0 + 59_000).await;
        assert_eq!(drain(&mut rx).len(), 1);

        tick_once(&state, id, T0 + 60_000).await;
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], json!({"type": "play_sound", "soundType": "one_minute_left"}));
    }

    #[tokio::test]
    async fn expired_level_advances_and_announces() {
        let (state, _store, id, mut rx) = fixture(vec![level(60.0), level(60.0)]).await;
        state
            .clocks()
            .mutate(id, |clock| {
                clock.running = true;
                clock.started_at_ms = Some(T0);
            })
            .await
            .unwrap();

        assert_eq!(tick_once(&state, id, T0 + 61_000).await, TickFlow::Continue);
        let frames = drain(&mut rx);
        let kinds: Vec<_> = frames.iter().map(|frame| frame["type"].clone()).collect();
        assert_eq!(kinds, vec!["snapshot", "system_event", "play_sound"]);
        assert_eq!(frames[0]["currentIndex"], 1);
        assert_eq!(frames[1]["event"], "LEVEL_ADVANCED");
        assert_eq!(frames[2]["soundType"], "level_advance");
        assert!(state.saves().is_pending(id));
    }

    #[tokio::test]
    async fn last_level_ends_and_unloads_the_tournament() {
        let (state, store, id, mut rx) = fixture(vec![level(60.0)]).await;
        state
            .clocks()
            .mutate(id, |clock| {
                clock.running = true;
                clock.started_at_ms = Some(T0);
            })
            .await
            .unwrap();

        state.clear_store().await;
        assert_eq!(tick_once(&state, id, T0 + 60_000).await, TickFlow::Stop);
        let frames = drain(&mut rx);
        let kinds: Vec<_> = frames.iter().map(|frame| frame["type"].clone()).collect();
        assert_eq!(kinds, vec!["snapshot", "system_event", "play_sound"]);
        assert_eq!(frames[0]["running"], false);
        assert_eq!(frames[1]["event"], "TOURNAMENT_ENDED");
        assert!(!state.clocks().contains(id));
        assert!(state.has_unsaved_ending(id));

        state.install_store(store.clone()).await;
        assert_eq!(tournament_service::flush_endings(&state).await, 0);
        assert!(!state.clocks().contains(id));

        let record = store.find_tournament(id).await.unwrap().unwrap();
        assert_eq!(record.status, TournamentStatus::Finished);

        assert_eq!(tick_once(&state, id, T0 + 61_000).await, TickFlow::Stop);
    }

    #[tokio::test]
    async fn structure_without_levels_keeps_ticking() {
        let (state, store, id, mut rx) = fixture(Vec::new()).await;
        state
            .clocks()
            .mutate(id, |clock| {
                clock.running = true;
                clock.started_at_ms = Some(T0);
            })
            .await
            .unwrap();

        assert_eq!(tick_once(&state, id, T0 + 5_000).await, TickFlow::Continue);
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "tick");
        assert!(state.clocks().contains(id));

        let record = store.find_tournament(id).await.unwrap().unwrap();
        assert_ne!(record.status, TournamentStatus::Finished);
    }

    #[tokio::test]
    async fn stale_ticker_release_keeps_the_newer_ticker() {
        let (state, _store, id, _rx) = fixture(vec![level(600.0)]).await;
        state.tickers().start(&state, id);
        state.tickers().release(id, u64::MAX);
        assert!(state.tickers().is_running(id));
        state.tickers().stop(id);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_keeps_one_ticker_per_tournament() {
        let (state, _store, id, mut rx) = fixture(vec![level(600.0)]).await;
        state.tickers().start(&state, id);
        state.tickers().start(&state, id);
        assert!(state.tickers().is_running(id));

        tokio::time::sleep(TICK_PERIOD * 3 + Duration::from_millis(10)).await;
        let ticks = drain(&mut rx);
        assert_eq!(ticks.len(), 3);

        state.tickers().stop(id);
        assert!(!state.tickers().is_running(id));
    }
}
