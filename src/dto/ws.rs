//! Clock WebSocket protocol: inbound commands and outbound broadcasts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::state::{
    clock::{ClockEvent, Snapshot},
    commands::PlayersPatch,
    tournament::{clamp_to_count, coerce_int},
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from clock WebSocket clients.
///
/// Everything except `get_snapshot` requires the admin role.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a snapshot addressed to the caller only.
    GetSnapshot,
    /// Start or resume the countdown.
    AdminStart,
    /// Pause the countdown.
    AdminPause,
    /// Restart the active level.
    AdminResetLevel,
    /// Move to the next level.
    AdminNext,
    /// Move to the previous level.
    AdminPrev,
    /// Jump to a level by index.
    AdminJump {
        /// Target index; numeric strings and floats are accepted.
        #[serde(default)]
        #[schema(value_type = i64)]
        index: Value,
    },
    /// Replace the blind structure.
    AdminUpdateTournament {
        /// New structure in its stored layout.
        #[serde(default)]
        #[schema(value_type = Object)]
        tournament: Value,
    },
    /// Give the active level more (or less) time.
    AdminAddTime {
        /// Seconds to add, 60 when missing.
        #[serde(default)]
        #[schema(value_type = Option<i64>)]
        seconds: Option<Value>,
    },
    /// Overwrite player counters.
    AdminSetPlayers(PlayersPatchInput),
    /// Count one rebuy.
    AdminRebuy,
    /// Count one add-on.
    AdminAddOn,
    /// Eliminate one player.
    AdminBustout,
    /// Any other type; ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Loosely-typed counters sent with `admin_set_players`.
pub struct PlayersPatchInput {
    /// Paid entries.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub registered: Option<Value>,
    /// Eliminated players.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub busted: Option<Value>,
    /// Rebuys sold.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub rebuy_count: Option<Value>,
    /// Add-ons sold.
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub add_on_count: Option<Value>,
}

impl From<PlayersPatchInput> for PlayersPatch {
    fn from(input: PlayersPatchInput) -> Self {
        let count = |value: Option<Value>| value.as_ref().and_then(coerce_int).map(clamp_to_count);
        Self {
            registered: count(input.registered),
            busted: count(input.busted),
            rebuy_count: count(input.rebuy_count),
            add_on_count: count(input.add_on_count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Audio cue a clock display should play.
pub enum SoundType {
    /// Clock started.
    Start,
    /// Clock paused.
    Pause,
    /// Level restarted.
    ResetLevel,
    /// Next level reached, by command or expiry.
    LevelAdvance,
    /// Previous level selected.
    LevelBack,
    /// Level selected by index.
    LevelJump,
    /// Sixty seconds left in a running level.
    OneMinuteLeft,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to clock WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state, sent on connect and after every change.
    Snapshot(Snapshot),
    /// Periodic refresh while the tournament is loaded.
    Tick(Snapshot),
    /// Cue to play after the change it belongs to.
    PlaySound {
        /// Which cue.
        #[serde(rename = "soundType")]
        sound_type: SoundType,
    },
    /// Level expiry announced by the ticker.
    SystemEvent {
        /// What happened.
        event: ClockEvent,
    },
    /// Rejection of the caller's last message; never broadcast.
    ErrorMsg {
        /// Reason.
        message: String,
    },
}
