//! Pure clock arithmetic over [`TournamentState`].
//!
//! Nothing here reads the system clock: every operation takes `now_ms` so ticks, commands and
//! tests agree on a single instant.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::tournament::{Level, Structure, TournamentState};

/// Time accounting of the active level, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Timing {
    /// Full duration of the level.
    pub total: f64,
    /// Consumed time, including the live segment when running.
    pub elapsed: f64,
    /// Time left, never negative.
    pub remaining: f64,
}

/// Player counters with the derived figures displays show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Paid entries.
    pub registered: u64,
    /// Eliminated players.
    pub busted: u64,
    /// Players still in the game.
    pub active: u64,
    /// Rebuys sold.
    pub rebuy_count: u64,
    /// Add-ons sold.
    pub add_on_count: u64,
    /// Total money collected.
    pub prize_pool: u64,
}

/// Public view of a tournament at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Blind structure and money settings.
    pub tournament: Structure,
    /// Whether the countdown is advancing.
    pub running: bool,
    /// Index of the active level.
    pub current_index: usize,
    /// Timing of the active level.
    pub timing: Timing,
    /// Instant the snapshot was taken, for client-side drift correction.
    pub server_now_ms: i64,
    /// Player counters.
    pub players: PlayerSummary,
}

/// Transition produced when the active level runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockEvent {
    /// The next level became active.
    LevelAdvanced,
    /// The last level expired; the clock is stopped for good.
    TournamentEnded,
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

impl TournamentState {
    /// Active level, if the structure has any.
    pub fn current_level(&self) -> Option<&Level> {
        self.structure.levels.get(self.current_index)
    }

    /// Duration of the active level.
    ///
    /// Falls back to the structure default, then to zero when even that is unusable.
    pub fn level_total_seconds(&self) -> f64 {
        let Some(level) = self.current_level() else {
            return 0.0;
        };
        level
            .seconds()
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .unwrap_or_else(|| {
                let fallback = self.structure.default_level_seconds;
                if fallback.is_finite() && fallback >= 0.0 {
                    fallback
                } else {
                    0.0
                }
            })
    }

    /// Whole seconds spent in the live run segment, floored.
    pub fn live_elapsed_seconds(&self, now_ms: i64) -> i64 {
        match (self.running, self.started_at_ms) {
            (true, Some(started)) => now_ms.saturating_sub(started).div_euclid(1000),
            _ => 0,
        }
    }

    pub(crate) fn stored_elapsed_seconds(&self) -> f64 {
        let stored = self.elapsed_in_current_seconds;
        if stored.is_finite() && stored >= 0.0 {
            stored
        } else {
            0.0
        }
    }

    /// Time accounting of the active level at `now_ms`.
    pub fn timing(&self, now_ms: i64) -> Timing {
        let total = self.level_total_seconds();
        let elapsed = self.stored_elapsed_seconds() + self.live_elapsed_seconds(now_ms) as f64;
        Timing {
            total,
            elapsed,
            remaining: (total - elapsed).max(0.0),
        }
    }

    /// Player counters with the active count and the prize pool.
    pub fn summary(&self) -> PlayerSummary {
        let players = self.players;
        let price = |amount: i64| u64::try_from(amount).unwrap_or(0);
        let prize_pool = players
            .registered
            .saturating_mul(price(self.structure.buy_in))
            .saturating_add(players.rebuy_count.saturating_mul(price(self.structure.rebuy_amount)))
            .saturating_add(
                players
                    .add_on_count
                    .saturating_mul(price(self.structure.add_on_amount)),
            );

        PlayerSummary {
            registered: players.registered,
            busted: players.busted,
            active: players.registered.saturating_sub(players.busted),
            rebuy_count: players.rebuy_count,
            add_on_count: players.add_on_count,
            prize_pool,
        }
    }

    /// Public view at `now_ms`.
    pub fn snapshot(&self, now_ms: i64) -> Snapshot {
        Snapshot {
            tournament: self.structure.clone(),
            running: self.running,
            current_index: self.current_index,
            timing: self.timing(now_ms),
            server_now_ms: now_ms,
            players: self.summary(),
        }
    }

    /// Advance past an expired level.
    ///
    /// Moves to the next level keeping the running flag, or stops the clock when the last level
    /// is done. Applies at most one transition per call; `None` when time is left.
    pub fn advance_if_expired(&mut self, now_ms: i64) -> Option<ClockEvent> {
        if self.current_level().is_none() || self.timing(now_ms).remaining > 0.0 {
            return None;
        }

        if self.current_index + 1 < self.structure.levels.len() {
            self.current_index += 1;
            self.elapsed_in_current_seconds = 0.0;
            self.started_at_ms = self.running.then_some(now_ms);
            Some(ClockEvent::LevelAdvanced)
        } else {
            self.running = false;
            self.started_at_ms = None;
            self.elapsed_in_current_seconds = self.level_total_seconds();
            Some(ClockEvent::TournamentEnded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tournament::Players;

    const T0: i64 = 1_700_000_000_000;

    fn level(seconds: Option<f64>) -> Level {
        Level::Level {
            title: "L".into(),
            sb: 25,
            bb: 50,
            ante: 0,
            seconds,
        }
    }

    fn state_with(levels: Vec<Level>) -> TournamentState {
        let mut structure = Structure::default();
        structure.levels = levels;
        TournamentState::new(structure)
    }

    #[test]
    fn running_level_counts_whole_seconds() {
        let mut state = state_with(vec![level(Some(600.0))]);
        state.running = true;
        state.started_at_ms = Some(T0);
        state.elapsed_in_current_seconds = 100.0;

        let timing = state.timing(T0 + 30_500);
        assert_eq!(timing.total, 600.0);
        assert_eq!(timing.elapsed, 130.0);
        assert_eq!(timing.remaining, 470.0);
    }

    #[test]
    fn paused_level_ignores_wall_clock() {
        let mut state = state_with(vec![level(Some(600.0))]);
        state.elapsed_in_current_seconds = 42.0;
        assert_eq!(state.timing(T0).elapsed, 42.0);
        assert_eq!(state.timing(T0 + 3_600_000).elapsed, 42.0);
    }

    #[test]
    fn missing_duration_uses_structure_default() {
        let mut state = state_with(vec![level(None)]);
        state.structure.default_level_seconds = 720.0;
        assert_eq!(state.level_total_seconds(), 720.0);

        let empty = state_with(Vec::new());
        assert_eq!(empty.timing(T0).total, 0.0);
        assert_eq!(empty.timing(T0).remaining, 0.0);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let mut state = state_with(vec![level(Some(60.0))]);
        state.elapsed_in_current_seconds = 500.0;
        assert_eq!(state.timing(T0).remaining, 0.0);
    }

    #[test]
    fn summary_derives_active_and_prize_pool() {
        let mut state = TournamentState::default();
        state.structure.buy_in = 200;
        state.structure.rebuy_amount = 200;
        state.structure.add_on_amount = 100;
        state.players = Players {
            registered: 10,
            busted: 3,
            rebuy_count: 2,
            add_on_count: 4,
        };

        let summary = state.summary();
        assert_eq!(summary.active, 7);
        assert_eq!(summary.prize_pool, 10 * 200 + 2 * 200 + 4 * 100);
    }

    #[test]
    fn over_busted_tournament_has_no_active_players() {
        let mut state = TournamentState::default();
        state.players.registered = 2;
        state.players.busted = 5;
        assert_eq!(state.summary().active, 0);
    }

    #[test]
    fn expiry_advances_one_level_and_keeps_running() {
        let mut state = state_with(vec![level(Some(600.0)), level(Some(600.0))]);
        state.running = true;
        state.started_at_ms = Some(T0);

        let later = T0 + 601_000;
        assert_eq!(state.advance_if_expired(later), Some(ClockEvent::LevelAdvanced));
        assert_eq!(state.current_index, 1);
        assert_eq!(state.elapsed_in_current_seconds, 0.0);
        assert_eq!(state.started_at_ms, Some(later));
        assert!(state.running);

        assert_eq!(state.advance_if_expired(later + 1_000), None);
    }

    #[test]
    fn paused_expired_level_still_advances() {
        let mut state = state_with(vec![level(Some(900.0)), level(Some(900.0))]);
        state.elapsed_in_current_seconds = 900.0;

        assert_eq!(state.advance_if_expired(T0), Some(ClockEvent::LevelAdvanced));
        assert_eq!(state.current_index, 1);
        assert!(!state.running);
        assert_eq!(state.started_at_ms, None);
    }

    #[test]
    fn last_level_expiry_ends_the_tournament() {
        let mut state = state_with(vec![level(Some(600.0)), level(Some(600.0))]);
        state.current_index = 1;
        state.running = true;
        state.started_at_ms = Some(T0);

        assert_eq!(
            state.advance_if_expired(T0 + 600_000),
            Some(ClockEvent::TournamentEnded)
        );
        assert!(!state.running);
        assert_eq!(state.started_at_ms, None);
        assert_eq!(state.elapsed_in_current_seconds, 600.0);
        assert_eq!(state.current_index, 1);
    }

    #[test]
    fn structure_without_levels_never_expires() {
        let mut state = TournamentState::from_value(&serde_json::json!({
            "tournament": {"levels": []},
            "running": true,
            "startedAtMs": T0,
        }));
        assert!(state.structure.levels.is_empty());

        assert_eq!(state.advance_if_expired(T0 + 1_000), None);
        assert_eq!(state.advance_if_expired(T0 + 3_600_000), None);
        assert_eq!(state.current_index, 0);
    }

    #[test]
    fn snapshot_reflects_clock_and_players() {
        let mut state = TournamentState::default();
        state.players.registered = 3;
        let snapshot = state.snapshot(T0);
        assert_eq!(snapshot.server_now_ms, T0);
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.timing.remaining, 900.0);
        assert_eq!(snapshot.players.active, 3);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["serverNowMs"], T0);
        assert_eq!(value["players"]["prizePool"], 600);
        assert_eq!(value["tournament"]["levels"][0]["type"], "level");
    }
}
