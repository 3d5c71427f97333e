use serde::{Deserialize, Serialize};

/// Every command the client can send upstream, as a closed union.
///
/// Wire shape mirrors inbound events: `{"event": "...", "payload":
/// {...}}`, adjacently tagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Join a logical room (e.g. `course:<id>`); presence and typing
    /// events for that room start flowing after this.
    JoinRoom { room: String },
    LeaveRoom { room: String },
    MarkNotificationsRead { ids: Vec<String> },
    MarkAllNotificationsRead,
    Typing { room: String },
    StoppedTyping { room: String },
    /// Admin moderation action relayed to the affected sessions.
    ModerationAction {
        target_id: String,
        action: String,
        reason: Option<String>,
    },
    /// Heartbeat; the server answers with a `pong` frame the transport
    /// swallows.
    Ping,
}

impl ClientCommand {
    pub fn join(room: impl Into<String>) -> Self {
        ClientCommand::JoinRoom { room: room.into() }
    }

    pub fn leave(room: impl Into<String>) -> Self {
        ClientCommand::LeaveRoom { room: room.into() }
    }
}
