//! Per-tournament observer groups and best-effort publishing.

use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::tournament::TournamentId;
use crate::dto::ws::ServerMessage;

/// Identifier of a connected clock observer.
pub type ObserverId = Uuid;

/// Handle used to push frames to a connected clock observer.
#[derive(Clone)]
pub struct Observer {
    /// Connection identifier, used to leave the group.
    pub id: ObserverId,
    /// Queue drained by the connection's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Per-tournament fan-out of clock messages to connected observers.
///
/// Each observer owns an unbounded queue drained by its socket writer, so a slow client never
/// holds up publishing; observers whose queue is closed are dropped on the next publish.
#[derive(Default)]
pub struct BroadcastHub {
    groups: DashMap<TournamentId, HashMap<ObserverId, mpsc::UnboundedSender<Message>>>,
}

impl BroadcastHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `observer` to messages of `tournament_id`.
    pub fn join(&self, tournament_id: TournamentId, observer: Observer) {
        self.groups
            .entry(tournament_id)
            .or_default()
            .insert(observer.id, observer.tx);
    }

    /// Unsubscribe an observer; empty groups are discarded.
    pub fn leave(&self, tournament_id: TournamentId, observer_id: ObserverId) {
        if let Some(mut group) = self.groups.get_mut(&tournament_id) {
            group.remove(&observer_id);
        }
        self.groups
            .remove_if(&tournament_id, |_, group| group.is_empty());
    }

    /// Number of observers subscribed to `tournament_id`.
    pub fn observer_count(&self, tournament_id: TournamentId) -> usize {
        self.groups
            .get(&tournament_id)
            .map_or(0, |group| group.len())
    }

    /// Send `message` to every observer of `tournament_id`, returning how many accepted it.
    pub fn publish(&self, tournament_id: TournamentId, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        if let Some(group) = self.groups.get(&tournament_id) {
            for (observer_id, tx) in group.iter() {
                if tx.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*observer_id);
                }
            }
        }

        for observer_id in closed {
            debug!(tournament_id, %observer_id, "dropping closed clock observer");
            self.leave(tournament_id, observer_id);
        }
        delivered
    }
}

/// Serialize a message into a text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize clock message `{message:?}`");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ws::SoundType;

    fn observer() -> (Observer, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Observer {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn publish_reaches_only_the_tournament_group() {
        let hub = BroadcastHub::new();
        let (first, mut first_rx) = observer();
        let (other, mut other_rx) = observer();
        hub.join(1, first);
        hub.join(2, other);

        let delivered = hub.publish(
            1,
            &ServerMessage::PlaySound {
                sound_type: SoundType::Start,
            },
        );

        assert_eq!(delivered, 1);
        let frame = text(first_rx.try_recv().unwrap());
        assert!(frame.contains("\"play_sound\""));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn closed_observers_are_pruned() {
        let hub = BroadcastHub::new();
        let (alive, mut alive_rx) = observer();
        let (gone, gone_rx) = observer();
        hub.join(1, alive);
        hub.join(1, gone);
        drop(gone_rx);

        let message = ServerMessage::ErrorMsg {
            message: "x".into(),
        };
        assert_eq!(hub.publish(1, &message), 1);
        assert_eq!(hub.observer_count(1), 1);
        assert!(alive_rx.try_recv().is_ok());
    }

    #[test]
    fn leaving_last_observer_discards_group() {
        let hub = BroadcastHub::new();
        let (only, _rx) = observer();
        let id = only.id;
        hub.join(5, only);
        hub.leave(5, id);
        assert_eq!(hub.observer_count(5), 0);
        assert!(hub.groups.get(&5).is_none());
    }
}
