use log::warn;
use serde::{Deserialize, Serialize};

use crate::types::{Announcement, ContentReport, Course, Notification, Payout, Ticket};

/// Every event the push channel can deliver, as a closed union.
///
/// The wire shape is adjacently tagged: `{"event": "...", "payload":
/// {...}}`. Dispatch happens through one exhaustive match in
/// [`crate::router::StoreState::apply`], so adding a variant without
/// handling it fails to compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    CourseCreated(Course),
    CourseUpdated(Course),
    CourseDeleted { id: String },
    TicketCreated(Ticket),
    TicketUpdated(Ticket),
    TicketDeleted { id: String },
    AnnouncementCreated(Announcement),
    AnnouncementUpdated(Announcement),
    AnnouncementDeleted { id: String },
    /// Read-count tick; patches only the named derived field.
    AnnouncementStats { id: String, read_count: u64 },
    PayoutUpdated(Payout),
    ReportCreated(ContentReport),
    ReportUpdated(ContentReport),
    NotificationPushed(Notification),
    /// Another session of this user marked the listed notifications
    /// read.
    NotificationsRead { ids: Vec<String> },
    AllNotificationsRead,
    /// Backlog burst delivered after a reconnect.
    PendingNotifications {
        notifications: Vec<Notification>,
        unread_count: u64,
    },
    PresenceJoined { room: String, user_id: String },
    PresenceLeft { room: String, user_id: String },
    Typing { room: String, user_id: String },
    StoppedTyping { room: String, user_id: String },
}

impl ServerEvent {
    /// Parse a raw channel frame. Unknown event names and malformed
    /// payloads are logged and dropped; they must never surface as
    /// errors into the event loop.
    pub fn parse(raw: &serde_json::Value) -> Option<ServerEvent> {
        match serde_json::from_value(raw.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("dropping unparseable channel event: {e}; raw: {raw}");
                None
            }
        }
    }
}
