//! Room membership and fan-out for session sockets.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffer size for each connection's outbound channel
pub const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// One socket frame: `{"event": "...", "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Room name for a session id given as a string or a number
pub fn room_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Connected sockets and the session rooms they joined
#[derive(Default)]
pub struct Relay {
    connections: DashMap<Uuid, mpsc::Sender<Frame>>,
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: Uuid, sender: mpsc::Sender<Frame>) {
        self.connections.insert(connection_id, sender);
        tracing::debug!(connection_id = %connection_id, "Socket registered");
    }

    /// Forget a connection and drop it from every room
    pub fn unregister(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
        self.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        tracing::debug!(connection_id = %connection_id, "Socket unregistered");
    }

    pub fn join(&self, connection_id: Uuid, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        tracing::info!(
            connection_id = %connection_id,
            room = %room,
            members = self.room_size(room),
            "Socket joined session"
        );
    }

    pub fn leave(&self, connection_id: Uuid, room: &str) {
        let now_empty = match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.remove(&connection_id);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
        tracing::info!(connection_id = %connection_id, room = %room, "Socket left session");
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a frame to every member of `room` except `except`
    ///
    /// Returns how many sockets accepted it. A member whose buffer is full
    /// misses the frame.
    pub fn broadcast(&self, room: &str, frame: &Frame, except: Option<Uuid>) -> usize {
        let members: Vec<Uuid> = match self.rooms.get(room) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|id| Some(*id) != except)
                .collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for id in members {
            let Some(sender) = self.connections.get(&id) else {
                continue;
            };
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Dropped relay frame");
                }
            }
        }
        delivered
    }

    /// Server-originated event for everyone in a session room
    pub fn emit_to_session(&self, session_id: i64, event: &str, data: Value) -> usize {
        self.broadcast(&session_id.to_string(), &Frame::new(event, data), None)
    }

    /// Dispatch a frame received from a client
    pub fn handle_client_frame(&self, connection_id: Uuid, frame: Frame) {
        match frame.event.as_str() {
            "join-session" => match room_name(&frame.data) {
                Some(room) => self.join(connection_id, &room),
                None => tracing::warn!(connection_id = %connection_id, "join-session without a session id"),
            },
            "leave-session" => {
                if let Some(room) = room_name(&frame.data) {
                    self.leave(connection_id, &room);
                }
            }
            "token-moved" => self.relay(connection_id, "token-updated", frame.data),
            "drawing" => self.relay(connection_id, "drawing-update", frame.data),
            other => {
                tracing::debug!(connection_id = %connection_id, event = %other, "Ignoring unknown socket event");
            }
        }
    }

    /// Re-emit client data to the rest of the room named by `data.sessionId`
    fn relay(&self, connection_id: Uuid, event: &str, data: Value) {
        let Some(room) = data.get("sessionId").and_then(room_name) else {
            tracing::warn!(connection_id = %connection_id, event = %event, "Relay frame without sessionId");
            return;
        };
        self.broadcast(&room, &Frame::new(event, data), Some(connection_id));
    }
}
