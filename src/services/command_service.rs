//! Turns clock WebSocket messages into state changes, saves and broadcasts.

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    auth::Identity,
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    state::{
        SharedState,
        clock::now_ms,
        commands::Command,
        tournament::{Structure, TournamentId, coerce_int},
    },
};

/// Seconds added by `admin_add_time` when the payload names none.
const DEFAULT_ADD_TIME_SECONDS: i64 = 60;

/// Handle one inbound message for tournament `id`.
///
/// Returns the reply addressed to the caller only, if any. Changes are broadcast to the whole
/// group instead.
pub async fn handle_message(
    state: &SharedState,
    id: TournamentId,
    identity: &Identity,
    message: ClientMessage,
) -> Result<Option<ServerMessage>, ServiceError> {
    let command = match message {
        ClientMessage::GetSnapshot => {
            let snapshot = state.clocks().read_snapshot(id, now_ms()).await?;
            return Ok(Some(ServerMessage::Snapshot(snapshot)));
        }
        ClientMessage::Unknown => {
            debug!(tournament_id = id, "ignoring unknown message type");
            return Ok(None);
        }
        admin => {
            if !identity.is_admin() {
                return Err(ServiceError::Forbidden("admin role required".into()));
            }
            to_command(admin)?
        }
    };

    execute(state, id, command).await?;
    Ok(None)
}

/// Apply `command` to tournament `id`; when it changed anything, schedule a save and broadcast
/// the new snapshot followed by the command's sound.
pub async fn execute(
    state: &SharedState,
    id: TournamentId,
    command: Command,
) -> Result<bool, ServiceError> {
    let now = now_ms();
    let label = format!("{command:?}");
    let (effect, snapshot) = state
        .clocks()
        .mutate(id, |clock| {
            let effect = clock.apply(command, now);
            (effect, clock.snapshot(now))
        })
        .await?;

    if !effect.changed {
        debug!(tournament_id = id, command = %label, "command left the clock unchanged");
        return Ok(false);
    }

    state.saves().schedule(state, id);
    let hub = state.hub();
    hub.publish(id, &ServerMessage::Snapshot(snapshot));
    if let Some(sound_type) = effect.sound {
        hub.publish(id, &ServerMessage::PlaySound { sound_type });
    }
    info!(tournament_id = id, command = %label, "command applied");
    Ok(true)
}

fn to_command(message: ClientMessage) -> Result<Command, ServiceError> {
    let command = match message {
        ClientMessage::AdminStart => Command::Start,
        ClientMessage::AdminPause => Command::Pause,
        ClientMessage::AdminResetLevel => Command::ResetLevel,
        ClientMessage::AdminNext => Command::Next,
        ClientMessage::AdminPrev => Command::Prev,
        ClientMessage::AdminJump { index } => Command::Jump(
            coerce_int(&index)
                .ok_or_else(|| ServiceError::InvalidInput("index must be a number".into()))?,
        ),
        ClientMessage::AdminUpdateTournament { tournament } => {
            Command::ReplaceStructure(Structure::parse(&tournament)?)
        }
        ClientMessage::AdminAddTime { seconds } => Command::AddTime(add_time_seconds(seconds)?),
        ClientMessage::AdminSetPlayers(patch) => Command::SetPlayers(patch.into()),
        ClientMessage::AdminRebuy => Command::Rebuy,
        ClientMessage::AdminAddOn => Command::AddOn,
        ClientMessage::AdminBustout => Command::Bustout,
        ClientMessage::GetSnapshot | ClientMessage::Unknown => {
            return Err(ServiceError::InvalidInput("not an admin command".into()));
        }
    };
    Ok(command)
}

fn add_time_seconds(seconds: Option<Value>) -> Result<i64, ServiceError> {
    match seconds {
        None | Some(Value::Null) => Ok(DEFAULT_ADD_TIME_SECONDS),
        Some(value) => coerce_int(&value)
            .ok_or_else(|| ServiceError::InvalidInput("seconds must be a number".into())),
    }
}
