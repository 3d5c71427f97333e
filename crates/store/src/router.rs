use chrono::Utc;

use crate::collection::CollectionState;
use crate::event::ServerEvent;
use crate::notifications::NotificationFeed;
use crate::presence::PresenceState;
use crate::types::{Announcement, ContentReport, Course, NotificationKind, Payout, Ticket};

/// The whole client-side state tree: one slice per collection, the
/// notification feed, and ephemeral presence. Constructed explicitly
/// and passed to whatever owns it; there is no global instance.
///
/// Each slice owns its collection exclusively. Events that touch two
/// slices are dual-dispatched from the single handler below, so the
/// update order is fixed in one place.
pub struct StoreState {
    pub courses: CollectionState<Course>,
    pub tickets: CollectionState<Ticket>,
    pub announcements: CollectionState<Announcement>,
    pub payouts: CollectionState<Payout>,
    pub reports: CollectionState<ContentReport>,
    pub notifications: NotificationFeed,
    pub presence: PresenceState,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::with_limit(20)
    }

    /// Build a state tree whose slices all paginate at `limit` items.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            courses: CollectionState::new(limit),
            tickets: CollectionState::new(limit),
            announcements: CollectionState::new(limit),
            payouts: CollectionState::new(limit),
            reports: CollectionState::new(limit),
            notifications: NotificationFeed::new(limit),
            presence: PresenceState::new(),
        }
    }

    /// Apply one inbound event. Every handler is idempotent under
    /// at-least-once delivery, and a payload referencing state that is
    /// not loaded skips that portion without failing.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::CourseCreated(course) => self.courses.insert_from_event(course),
            ServerEvent::CourseUpdated(course) => self.courses.update_from_event(course),
            ServerEvent::CourseDeleted { id } => self.courses.remove_from_event(&id),
            ServerEvent::TicketCreated(ticket) => self.tickets.insert_from_event(ticket),
            ServerEvent::TicketUpdated(ticket) => self.tickets.update_from_event(ticket),
            ServerEvent::TicketDeleted { id } => self.tickets.remove_from_event(&id),
            ServerEvent::AnnouncementCreated(a) => self.announcements.insert_from_event(a),
            ServerEvent::AnnouncementUpdated(a) => self.announcements.update_from_event(a),
            ServerEvent::AnnouncementDeleted { id } => self.announcements.remove_from_event(&id),
            ServerEvent::AnnouncementStats { id, read_count } => {
                self.announcements
                    .patch_from_event(&id, |a| a.read_count = read_count);
            }
            ServerEvent::PayoutUpdated(payout) => self.payouts.update_from_event(payout),
            ServerEvent::ReportCreated(report) => self.reports.insert_from_event(report),
            ServerEvent::ReportUpdated(report) => self.reports.update_from_event(report),
            ServerEvent::NotificationPushed(notification) => {
                let ticket_ref = match (&notification.kind, &notification.ref_id) {
                    (NotificationKind::TicketReply, Some(ref_id)) => Some(ref_id.clone()),
                    _ => None,
                };
                // Insert and counter bump happen in one transition; the
                // ticket tick piggybacks on the dedup result so a
                // redelivered event cannot double-count replies.
                if self.notifications.push(notification) {
                    if let Some(ticket_id) = ticket_ref {
                        self.tickets
                            .patch_from_event(&ticket_id, |t| t.reply_count += 1);
                    }
                }
            }
            ServerEvent::NotificationsRead { ids } => self.notifications.mark_read(&ids),
            ServerEvent::AllNotificationsRead => self.notifications.mark_all_read(),
            ServerEvent::PendingNotifications {
                notifications,
                unread_count,
            } => self.notifications.apply_backlog(notifications, unread_count),
            ServerEvent::PresenceJoined { room, user_id } => {
                self.presence.joined(&room, &user_id)
            }
            ServerEvent::PresenceLeft { room, user_id } => self.presence.left(&room, &user_id),
            ServerEvent::Typing { room, user_id } => {
                self.presence.typing(&room, &user_id, Utc::now())
            }
            ServerEvent::StoppedTyping { room, user_id } => {
                self.presence.stopped_typing(&room, &user_id)
            }
        }
    }
}
