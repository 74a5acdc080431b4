//! In-memory application state and the clock domain.

pub mod broadcast;
pub mod clock;
pub mod commands;
pub mod registry;
pub mod tournament;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};

use crate::{
    auth::TokenVerifier,
    config::AppConfig,
    dao::tournament_store::TournamentStore,
    error::ServiceError,
    services::{persistence::SaveQueue, ticker::TickScheduler},
};

pub use self::broadcast::BroadcastHub;
pub use self::registry::ClockRegistry;
use self::tournament::{TournamentId, TournamentState};

/// Reference-counted handle shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: loaded clocks, connected observers and the durable store.
pub struct AppState {
    config: AppConfig,
    verifier: Arc<dyn TokenVerifier>,
    store: RwLock<Option<Arc<dyn TournamentStore>>>,
    degraded: watch::Sender<bool>,
    clocks: ClockRegistry,
    hub: BroadcastHub,
    tickers: TickScheduler,
    saves: SaveQueue,
    /// Ended tournaments whose finished row is not stored yet.
    unsaved_endings: DashMap<TournamentId, TournamentState>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, verifier: Arc<dyn TokenVerifier>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let saves = SaveQueue::new(config.save_debounce());
        Arc::new(Self {
            config,
            verifier,
            store: RwLock::new(None),
            degraded: degraded_tx,
            clocks: ClockRegistry::new(),
            hub: BroadcastHub::new(),
            tickers: TickScheduler::default(),
            saves,
            unsaved_endings: DashMap::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Access-token verifier.
    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.verifier.as_ref()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TournamentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn TournamentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TournamentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only when it changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Loaded tournament clocks.
    pub fn clocks(&self) -> &ClockRegistry {
        &self.clocks
    }

    /// Per-tournament observer fan-out.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    /// Background tickers of loaded tournaments.
    pub fn tickers(&self) -> &TickScheduler {
        &self.tickers
    }

    /// Debounced write-behind of changed tournaments.
    pub fn saves(&self) -> &SaveQueue {
        &self.saves
    }

    /// Keep the final clock of an ended tournament until its finished row is stored.
    pub fn hold_ending(&self, id: TournamentId, clock: TournamentState) {
        self.unsaved_endings.insert(id, clock);
    }

    /// Whether `id` ended without its finished row being stored.
    pub fn has_unsaved_ending(&self, id: TournamentId) -> bool {
        self.unsaved_endings.contains_key(&id)
    }

    /// Copies of every held ending.
    pub fn unsaved_endings(&self) -> Vec<(TournamentId, TournamentState)> {
        self.unsaved_endings
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Drop the held ending of `id` once its row is stored.
    pub fn release_ending(&self, id: TournamentId) {
        self.unsaved_endings.remove(&id);
    }
}
