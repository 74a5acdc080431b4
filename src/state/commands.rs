//! Director commands and their effect on a single tournament clock.

use super::tournament::{Structure, TournamentState};
use crate::dto::ws::SoundType;

/// A validated admin action.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resume the countdown.
    Start,
    /// Freeze the countdown, folding the live segment into the elapsed time.
    Pause,
    /// Restart the active level from zero.
    ResetLevel,
    /// Skip to the following level.
    Next,
    /// Go back to the previous level.
    Prev,
    /// Select a level by index; out-of-range indices are ignored.
    Jump(i64),
    /// Swap the blind structure, keeping the index when it still fits.
    ReplaceStructure(Structure),
    /// Shift remaining time by a signed amount of seconds.
    AddTime(i64),
    /// Overwrite the given counters.
    SetPlayers(PlayersPatch),
    /// Count one rebuy.
    Rebuy,
    /// Count one add-on.
    AddOn,
    /// Eliminate one player, if any are still active.
    Bustout,
}

/// Partial update of the player counters; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayersPatch {
    /// Paid entries.
    pub registered: Option<u64>,
    /// Eliminated players.
    pub busted: Option<u64>,
    /// Rebuys sold.
    pub rebuy_count: Option<u64>,
    /// Add-ons sold.
    pub add_on_count: Option<u64>,
}

/// Outcome of applying a [`Command`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandEffect {
    /// Whether the state was modified and must be saved and broadcast.
    pub changed: bool,
    /// Cue to broadcast after the snapshot.
    pub sound: Option<SoundType>,
}

impl CommandEffect {
    fn unchanged() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            changed: true,
            sound: None,
        }
    }

    fn with_sound(sound: SoundType) -> Self {
        Self {
            changed: true,
            sound: Some(sound),
        }
    }
}

impl TournamentState {
    /// Apply `command` at `now_ms`.
    pub fn apply(&mut self, command: Command, now_ms: i64) -> CommandEffect {
        match command {
            Command::Start => {
                if self.running {
                    return CommandEffect::unchanged();
                }
                self.running = true;
                self.started_at_ms = Some(now_ms);
                CommandEffect::with_sound(SoundType::Start)
            }
            Command::Pause => {
                if !self.running {
                    return CommandEffect::unchanged();
                }
                self.elapsed_in_current_seconds = self.timing(now_ms).elapsed;
                self.running = false;
                self.started_at_ms = None;
                CommandEffect::with_sound(SoundType::Pause)
            }
            Command::ResetLevel => {
                self.restart_level(now_ms);
                CommandEffect::with_sound(SoundType::ResetLevel)
            }
            Command::Next => {
                if self.current_index + 1 >= self.structure.levels.len() {
                    return CommandEffect::unchanged();
                }
                self.current_index += 1;
                self.restart_level(now_ms);
                CommandEffect::with_sound(SoundType::LevelAdvance)
            }
            Command::Prev => {
                if self.current_index == 0 {
                    return CommandEffect::unchanged();
                }
                self.current_index -= 1;
                self.restart_level(now_ms);
                CommandEffect::with_sound(SoundType::LevelBack)
            }
            Command::Jump(index) => {
                let Some(index) = usize::try_from(index)
                    .ok()
                    .filter(|index| *index < self.structure.levels.len())
                else {
                    return CommandEffect::unchanged();
                };
                self.current_index = index;
                self.restart_level(now_ms);
                CommandEffect::with_sound(SoundType::LevelJump)
            }
            Command::ReplaceStructure(structure) => {
                self.current_index = self.current_index.min(structure.last_index());
                self.structure = structure;
                self.restart_level(now_ms);
                CommandEffect::changed()
            }
            Command::AddTime(seconds) => {
                self.add_time(seconds, now_ms);
                CommandEffect::changed()
            }
            Command::SetPlayers(patch) => {
                let players = &mut self.players;
                players.registered = patch.registered.unwrap_or(players.registered);
                players.busted = patch.busted.unwrap_or(players.busted);
                players.rebuy_count = patch.rebuy_count.unwrap_or(players.rebuy_count);
                players.add_on_count = patch.add_on_count.unwrap_or(players.add_on_count);
                CommandEffect::changed()
            }
            Command::Rebuy => {
                self.players.rebuy_count = self.players.rebuy_count.saturating_add(1);
                CommandEffect::changed()
            }
            Command::AddOn => {
                self.players.add_on_count = self.players.add_on_count.saturating_add(1);
                CommandEffect::changed()
            }
            Command::Bustout => {
                if self.summary().active == 0 {
                    return CommandEffect::unchanged();
                }
                self.players.busted += 1;
                CommandEffect::changed()
            }
        }
    }

    fn restart_level(&mut self, now_ms: i64) {
        self.elapsed_in_current_seconds = 0.0;
        self.started_at_ms = self.running.then_some(now_ms);
    }

    /// Positive `seconds` give time back, negative ones consume it.
    fn add_time(&mut self, seconds: i64, now_ms: i64) {
        let mut elapsed = self.stored_elapsed_seconds();
        if self.running {
            elapsed += self.live_elapsed_seconds(now_ms) as f64;
            self.started_at_ms = Some(now_ms);
        }
        self.elapsed_in_current_seconds = (elapsed - seconds as f64).max(0.0);
    }
}
