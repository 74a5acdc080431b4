//! In-memory tournament model: blind structure, player counters and the raw clock fields.
//!
//! Loaded JSON is never trusted: [`TournamentState::from_value`] repairs anything malformed or
//! missing instead of failing, so a damaged row never prevents the server from booting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dao::models::TournamentStatus;

/// Identifier of a tournament, shared by the durable row and the in-memory clock.
pub type TournamentId = u64;

/// Tournament used by single-tournament clients that do not name one.
pub const LEGACY_TOURNAMENT_ID: TournamentId = 1;
/// Level duration applied when neither the level nor the structure provides a usable one.
pub const DEFAULT_LEVEL_SECONDS: f64 = 15.0 * 60.0;
/// Display name of tournaments created without one.
pub const DEFAULT_TOURNAMENT_NAME: &str = "Pokerturnering";

const DEFAULT_BREAK_SECONDS: f64 = 10.0 * 60.0;
const DEFAULT_BUY_IN: i64 = 200;
const DEFAULT_STARTING_STACK: i64 = 10_000;

/// Tournament configuration: money amounts and the ordered list of levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    /// Display name of the tournament.
    pub name: String,
    /// Duration used by levels that do not declare their own.
    pub default_level_seconds: f64,
    /// Price of a single entry.
    pub buy_in: i64,
    /// Price of a rebuy.
    pub rebuy_amount: i64,
    /// Price of an add-on.
    pub add_on_amount: i64,
    /// Chips handed to every entrant.
    pub starting_stack: i64,
    /// Blind levels and breaks, played in order.
    pub levels: Vec<Level>,
}

/// One segment of the blind structure.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Level {
    /// A regular blind level.
    Level {
        /// Label shown on the clock.
        title: String,
        /// Small blind.
        sb: i64,
        /// Big blind.
        bb: i64,
        /// Ante, zero when there is none.
        ante: i64,
        /// Duration in seconds; falls back to the structure default when absent.
        seconds: Option<f64>,
    },
    /// A pause between levels.
    Break {
        /// Label shown on the clock.
        title: String,
        /// Duration in seconds; falls back to the structure default when absent.
        seconds: Option<f64>,
    },
}

/// Player counters maintained by the tournament director.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Players {
    /// Number of paid entries.
    pub registered: u64,
    /// Number of eliminated players.
    pub busted: u64,
    /// Number of rebuys sold.
    pub rebuy_count: u64,
    /// Number of add-ons sold.
    pub add_on_count: u64,
}

/// Mutable clock state of a single tournament.
///
/// `started_at_ms` is set exactly when `running` is true and marks the start of the current run
/// segment; `elapsed_in_current_seconds` only accumulates finished segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentState {
    /// Blind structure and money settings.
    #[serde(rename = "tournament")]
    pub structure: Structure,
    /// Player counters.
    pub players: Players,
    /// Whether the countdown is advancing.
    pub running: bool,
    /// Index of the active level.
    pub current_index: usize,
    /// Epoch milliseconds at which the current run segment began.
    pub started_at_ms: Option<i64>,
    /// Seconds consumed in the current level by earlier run segments.
    pub elapsed_in_current_seconds: f64,
}

/// Reasons an admin-supplied structure is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The payload is not a JSON object.
    #[error("tournament structure must be an object")]
    NotAnObject,
    /// `levels` is missing or is not a list.
    #[error("tournament structure must contain a list of levels")]
    MissingLevels,
    /// `levels` is an empty list.
    #[error("tournament structure must contain at least one level")]
    EmptyLevels,
    /// A level entry is not an object.
    #[error("level {index} is not an object")]
    MalformedLevel {
        /// Position of the offending entry.
        index: usize,
    },
}

impl Level {
    /// Declared duration, if any.
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Level::Level { seconds, .. } | Level::Break { seconds, .. } => *seconds,
        }
    }

    /// Label of the level.
    pub fn title(&self) -> &str {
        match self {
            Level::Level { title, .. } | Level::Break { title, .. } => title,
        }
    }

    fn seconds_mut(&mut self) -> &mut Option<f64> {
        match self {
            Level::Level { seconds, .. } | Level::Break { seconds, .. } => seconds,
        }
    }

    /// Build a level from a loosely-typed JSON object.
    ///
    /// A duration in minutes (`durationMinutes`, then `minutes`) wins over one in seconds
    /// (`durationSeconds`, then `seconds`).
    fn from_object(object: &Map<String, Value>) -> Self {
        let title = object
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let seconds = resolve_duration(object);

        match object.get("type").and_then(Value::as_str) {
            Some("break") => Level::Break { title, seconds },
            _ => Level::Level {
                title,
                sb: int_or_zero(object.get("sb")),
                bb: int_or_zero(object.get("bb")),
                ante: int_or_zero(object.get("ante")),
                seconds,
            },
        }
    }

    fn blinds(title: &str, sb: i64, bb: i64, ante: i64) -> Self {
        Level::Level {
            title: title.to_owned(),
            sb,
            bb,
            ante,
            seconds: Some(DEFAULT_LEVEL_SECONDS),
        }
    }

    fn pause() -> Self {
        Level::Break {
            title: "Pause".to_owned(),
            seconds: Some(DEFAULT_BREAK_SECONDS),
        }
    }
}

impl Structure {
    /// Built-in blind structure with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_level_seconds: DEFAULT_LEVEL_SECONDS,
            buy_in: DEFAULT_BUY_IN,
            rebuy_amount: DEFAULT_BUY_IN,
            add_on_amount: DEFAULT_BUY_IN,
            starting_stack: DEFAULT_STARTING_STACK,
            levels: vec![
                Level::blinds("Level 1", 25, 50, 0),
                Level::blinds("Level 2", 50, 100, 0),
                Level::blinds("Level 3", 75, 150, 0),
                Level::pause(),
                Level::blinds("Level 4", 100, 200, 25),
                Level::blinds("Level 5", 150, 300, 25),
                Level::blinds("Level 6", 200, 400, 50),
                Level::pause(),
                Level::blinds("Level 7", 300, 600, 75),
                Level::blinds("Level 8", 400, 800, 100),
                Level::blinds("Level 9", 500, 1000, 100),
                Level::pause(),
                Level::blinds("Level 10", 600, 1200, 200),
                Level::blinds("Level 11", 800, 1600, 200),
                Level::blinds("Level 12", 1000, 2000, 300),
            ],
        }
    }

    /// Parse a structure submitted by an admin.
    ///
    /// Every level must be an object and at least one must be present.
    pub fn parse(value: &Value) -> Result<Self, StructureError> {
        let object = value.as_object().ok_or(StructureError::NotAnObject)?;
        let raw_levels = object
            .get("levels")
            .and_then(Value::as_array)
            .ok_or(StructureError::MissingLevels)?;
        if raw_levels.is_empty() {
            return Err(StructureError::EmptyLevels);
        }

        let levels = raw_levels
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                raw.as_object()
                    .map(Level::from_object)
                    .ok_or(StructureError::MalformedLevel { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut structure = Self::fields_from_object(object, levels);
        structure.normalize();
        Ok(structure)
    }

    /// Rebuild a structure from stored JSON, dropping entries that cannot be interpreted.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let levels = object
            .get("levels")
            .and_then(Value::as_array)
            .map(|raw| {
                raw.iter()
                    .filter_map(Value::as_object)
                    .map(Level::from_object)
                    .collect()
            })
            .unwrap_or_default();

        let mut structure = Self::fields_from_object(object, levels);
        structure.normalize();
        structure
    }

    fn fields_from_object(object: &Map<String, Value>, levels: Vec<Level>) -> Self {
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_TOURNAMENT_NAME)
            .to_owned();

        Self {
            name,
            default_level_seconds: finite_non_negative(object.get("defaultLevelSeconds"))
                .unwrap_or(DEFAULT_LEVEL_SECONDS),
            buy_in: int_or_zero(object.get("buyIn")),
            rebuy_amount: int_or_zero(object.get("rebuyAmount")),
            add_on_amount: int_or_zero(object.get("addOnAmount")),
            starting_stack: int_or_zero(object.get("startingStack")),
            levels,
        }
    }

    /// Repair durations that are negative or not finite.
    pub fn normalize(&mut self) {
        if !is_usable_duration(self.default_level_seconds) {
            self.default_level_seconds = DEFAULT_LEVEL_SECONDS;
        }
        for level in &mut self.levels {
            let seconds = level.seconds_mut();
            if seconds.is_some_and(|value| !is_usable_duration(value)) {
                *seconds = None;
            }
        }
    }

    /// Index of the last level, zero for an empty structure.
    pub fn last_index(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

impl Default for Structure {
    fn default() -> Self {
        Self::named(DEFAULT_TOURNAMENT_NAME)
    }
}

impl Players {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(object) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        let count = |key: &str| {
            object
                .get(key)
                .and_then(coerce_int)
                .map_or(0, clamp_to_count)
        };

        Self {
            registered: count("registered"),
            busted: count("busted"),
            rebuy_count: count("rebuyCount"),
            add_on_count: count("addOnCount"),
        }
    }
}

impl TournamentState {
    /// Fresh, paused state at the first level of `structure`.
    pub fn new(structure: Structure) -> Self {
        Self {
            structure,
            players: Players::default(),
            running: false,
            current_index: 0,
            started_at_ms: None,
            elapsed_in_current_seconds: 0.0,
        }
    }

    /// Rebuild a state from stored JSON, repairing anything malformed.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let structure = object
            .get("tournament")
            .filter(|raw| raw.is_object())
            .map(Structure::from_value)
            .unwrap_or_default();

        let mut state = Self {
            structure,
            players: Players::from_value(object.get("players")),
            running: object.get("running").is_some_and(truthy),
            current_index: object
                .get("currentIndex")
                .and_then(coerce_int)
                .map_or(0, |index| usize::try_from(index).unwrap_or(0)),
            started_at_ms: object
                .get("startedAtMs")
                .and_then(Value::as_f64)
                .filter(|value| value.is_finite())
                .map(|value| value.trunc() as i64),
            elapsed_in_current_seconds: finite_non_negative(object.get("elapsedInCurrentSeconds"))
                .unwrap_or(0.0),
        };
        state.normalize();
        state
    }

    /// Serialize the state in its durable JSON layout.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Enforce the field invariants in place.
    pub fn normalize(&mut self) {
        self.structure.normalize();
        self.current_index = self.current_index.min(self.structure.last_index());
        if !is_usable_duration(self.elapsed_in_current_seconds) {
            self.elapsed_in_current_seconds = 0.0;
        }
        if !self.running {
            self.started_at_ms = None;
        }
    }

    /// Durable status matching the current clock.
    ///
    /// A paused clock that already consumed time still counts as running; only a clock that
    /// never moved is pending.
    pub fn status_hint(&self) -> TournamentStatus {
        if self.running || self.current_index > 0 || self.elapsed_in_current_seconds > 0.0 {
            TournamentStatus::Running
        } else {
            TournamentStatus::Pending
        }
    }
}

impl Default for TournamentState {
    fn default() -> Self {
        Self::new(Structure::default())
    }
}

/// Interpret a JSON value as an integer the way a lenient form parser would.
///
/// Integers are taken as-is, finite floats are truncated and numeric strings are parsed.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Clamp a signed count to the non-negative range.
pub fn clamp_to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn int_or_zero(value: Option<&Value>) -> i64 {
    value.and_then(coerce_int).unwrap_or(0)
}

fn finite_non_negative(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|number| is_usable_duration(*number))
}

fn is_usable_duration(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn resolve_duration(object: &Map<String, Value>) -> Option<f64> {
    let minutes = match object.get("durationMinutes") {
        Some(value) if value.is_number() => Some(value),
        _ => object.get("minutes"),
    };
    if let Some(minutes) = finite_non_negative(minutes) {
        return Some(minutes * 60.0);
    }

    finite_non_negative(object.get("durationSeconds"))
        .or_else(|| finite_non_negative(object.get("seconds")))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn stored(levels: Value) -> Value {
        json!({
            "tournament": {
                "name": "Fredagspoker",
                "defaultLevelSeconds": 900,
                "buyIn": 200,
                "rebuyAmount": 200,
                "addOnAmount": 100,
                "startingStack": 10000,
                "levels": levels,
            },
            "players": {"registered": 5, "busted": 1, "rebuyCount": 0, "addOnCount": 0},
            "running": false,
            "currentIndex": 0,
            "startedAtMs": null,
            "elapsedInCurrentSeconds": 0,
        })
    }

    #[test]
    fn non_object_input_falls_back_to_defaults() {
        assert_eq!(TournamentState::from_value(&json!(42)), TournamentState::default());
        assert_eq!(TournamentState::from_value(&Value::Null), TournamentState::default());
    }

    #[test]
    fn invalid_players_are_reset() {
        let mut raw = stored(json!([{"type": "level", "seconds": 600}]));
        raw["players"] = json!("not-a-dict");
        let state = TournamentState::from_value(&raw);
        assert_eq!(state.players, Players::default());

        raw["players"] = json!({
            "registered": 5,
            "busted": -3,
            "rebuyCount": "2",
            "addOnCount": 1.9,
        });
        let state = TournamentState::from_value(&raw);
        assert_eq!(state.players.registered, 5);
        assert_eq!(state.players.busted, 0);
        assert_eq!(state.players.rebuy_count, 2);
        assert_eq!(state.players.add_on_count, 1);
    }

    #[test]
    fn current_index_is_clamped_and_coerced() {
        let levels = json!([
            {"type": "level", "seconds": 600},
            {"type": "level", "seconds": 600},
            {"type": "break", "seconds": 300},
        ]);
        let mut raw = stored(levels);

        raw["currentIndex"] = json!(999);
        assert_eq!(TournamentState::from_value(&raw).current_index, 2);

        raw["currentIndex"] = json!(-5);
        assert_eq!(TournamentState::from_value(&raw).current_index, 0);

        raw["currentIndex"] = json!("1");
        assert_eq!(TournamentState::from_value(&raw).current_index, 1);
    }

    #[test]
    fn bad_clock_fields_are_repaired() {
        let mut raw = stored(json!([{"type": "level", "seconds": 600}]));
        raw["startedAtMs"] = json!("yesterday");
        raw["elapsedInCurrentSeconds"] = json!(-10);
        raw["running"] = json!(1);
        let state = TournamentState::from_value(&raw);
        assert!(state.running);
        assert_eq!(state.started_at_ms, None);
        assert_eq!(state.elapsed_in_current_seconds, 0.0);

        raw["running"] = json!(0);
        raw["startedAtMs"] = json!(1_700_000_000_000_i64);
        let state = TournamentState::from_value(&raw);
        assert!(!state.running);
        assert_eq!(state.started_at_ms, None, "a paused clock has no run segment");
    }

    #[test]
    fn minutes_take_precedence_over_seconds() {
        let raw = stored(json!([
            {"type": "level", "title": "A", "durationMinutes": 15, "seconds": 10},
            {"type": "level", "title": "B", "minutes": 1.5},
            {"type": "level", "title": "C", "durationSeconds": 600, "seconds": 10},
            {"type": "break", "title": "D", "seconds": -1},
        ]));
        let state = TournamentState::from_value(&raw);
        let seconds: Vec<_> = state.structure.levels.iter().map(Level::seconds).collect();
        assert_eq!(seconds, vec![Some(900.0), Some(90.0), Some(600.0), None]);
        assert!(matches!(state.structure.levels[3], Level::Break { .. }));
    }

    #[test]
    fn stored_non_object_levels_are_skipped() {
        let raw = stored(json!([{"type": "level", "seconds": 600}, "garbage", 3]));
        let state = TournamentState::from_value(&raw);
        assert_eq!(state.structure.levels.len(), 1);
    }

    #[test]
    fn admin_structure_must_be_well_formed() {
        assert_eq!(Structure::parse(&json!([])), Err(StructureError::NotAnObject));
        assert_eq!(
            Structure::parse(&json!({"levels": "nope"})),
            Err(StructureError::MissingLevels)
        );
        assert_eq!(
            Structure::parse(&json!({"levels": []})),
            Err(StructureError::EmptyLevels)
        );
        assert_eq!(
            Structure::parse(&json!({"levels": [{"type": "level"}, 7]})),
            Err(StructureError::MalformedLevel { index: 1 })
        );

        let structure = Structure::parse(&json!({
            "name": "Kveldsturnering",
            "buyIn": 300,
            "levels": [{"type": "level", "title": "L1", "sb": 25, "bb": 50, "durationMinutes": 20}],
        }))
        .unwrap();
        assert_eq!(structure.name, "Kveldsturnering");
        assert_eq!(structure.buy_in, 300);
        assert_eq!(structure.levels[0].seconds(), Some(1200.0));
    }

    #[test]
    fn durable_layout_survives_reload() {
        let mut state = TournamentState::default();
        state.current_index = 4;
        state.elapsed_in_current_seconds = 120.0;
        state.players.registered = 12;

        let value = state.to_value().unwrap();
        assert_eq!(value["tournament"]["levels"][3]["type"], "break");
        assert_eq!(value["currentIndex"], 4);
        assert_eq!(TournamentState::from_value(&value), state);
    }

    #[test]
    fn status_hint_tracks_progress() {
        let mut state = TournamentState::default();
        assert_eq!(state.status_hint(), TournamentStatus::Pending);
        state.elapsed_in_current_seconds = 3.0;
        assert_eq!(state.status_hint(), TournamentStatus::Running);
    }
}
