use log::debug;

use crate::collection::CollectionState;
use crate::types::{Entity, Notification};

/// The notification collection plus its unread counter.
///
/// The counter has exactly three write paths: the authoritative REST
/// resync, push-delivered notifications, and mark-read (local or pushed
/// from another session). Every path mutates the counter in the same
/// transition as the underlying set, so the two can never be observed
/// out of step.
pub struct NotificationFeed {
    pub collection: CollectionState<Notification>,
    unread_count: u64,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(20)
    }
}

impl NotificationFeed {
    pub fn new(limit: u32) -> Self {
        Self {
            collection: CollectionState::new(limit),
            unread_count: 0,
        }
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    /// Authoritative resync point: the server's unread count wins.
    pub fn resync_unread(&mut self, count: u64) {
        self.unread_count = count;
    }

    /// Insert a pushed notification at the head and bump the counter iff
    /// it is unread, atomically. Redelivery of an already-seen id leaves
    /// both the set and the counter untouched. Returns whether the
    /// notification was actually inserted, so dependent effects (e.g. a
    /// ticket's reply tick) can stay idempotent too.
    pub fn push(&mut self, notification: Notification) -> bool {
        if self.collection.get(notification.id()).is_some() {
            debug!("duplicate notification {} dropped", notification.id());
            return false;
        }
        let unread = !notification.is_read;
        self.collection.insert_from_event(notification);
        if unread {
            self.unread_count += 1;
        }
        true
    }

    /// Flip the listed notifications to read and decrement the counter
    /// by the number of loaded entities that were actually unread. The
    /// same logic serves local mark-read and the push event another
    /// session's mark-read produces, so the counter cannot drift between
    /// tabs.
    pub fn mark_read(&mut self, ids: &[String]) {
        let mut marked = 0u64;
        for item in self.collection.items.iter_mut() {
            if !item.is_read && ids.iter().any(|id| id == item.id()) {
                item.is_read = true;
                marked += 1;
            }
        }
        if let Some(detail) = self.collection.detail.as_mut() {
            if !detail.is_read && ids.iter().any(|id| id == detail.id()) {
                detail.is_read = true;
            }
        }
        self.unread_count = self.unread_count.saturating_sub(marked);
    }

    /// Mark everything read. The server marks pages that were never
    /// loaded locally too, so the counter drops straight to zero rather
    /// than by the loaded-set delta.
    pub fn mark_all_read(&mut self) {
        for item in self.collection.items.iter_mut() {
            item.is_read = true;
        }
        if let Some(detail) = self.collection.detail.as_mut() {
            detail.is_read = true;
        }
        self.unread_count = 0;
    }

    /// Apply a reconnection backlog: every missed notification goes
    /// through the same idempotent insert as a live push, then the
    /// counter resyncs from the burst's authoritative count.
    pub fn apply_backlog(&mut self, notifications: Vec<Notification>, unread_count: u64) {
        for notification in notifications {
            if self.collection.get(notification.id()).is_none() {
                self.collection.insert_from_event(notification);
            }
        }
        self.unread_count = unread_count;
    }

    /// Number of loaded notifications that are unread; after a resync
    /// the counter equals this plus whatever unread exists beyond the
    /// loaded page.
    pub fn loaded_unread(&self) -> u64 {
        self.collection
            .items
            .iter()
            .filter(|n| !n.is_read)
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationKind;
    use chrono::Utc;

    fn notif(id: &str, is_read: bool) -> Notification {
        let now = Utc::now();
        Notification {
            id: id.to_string(),
            kind: NotificationKind::System,
            title: format!("notification {id}"),
            body: String::new(),
            ref_id: None,
            is_read,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn push_counts_only_unread() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        feed.push(notif("n2", true));
        feed.push(notif("n3", false));
        assert_eq!(feed.unread_count(), 2);
        assert_eq!(feed.collection.items.len(), 3);
        // Newest first.
        assert_eq!(feed.collection.items[0].id, "n3");
    }

    #[test]
    fn duplicate_push_does_not_double_count() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        feed.push(notif("n1", false));
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.collection.items.len(), 1);
    }

    #[test]
    fn mark_all_read_zeroes_counter_and_flips_entities() {
        let mut feed = NotificationFeed::new(20);
        for i in 0..7 {
            feed.push(notif(&format!("n{i}"), false));
        }
        assert_eq!(feed.unread_count(), 7);
        feed.mark_all_read();
        assert_eq!(feed.unread_count(), 0);
        assert!(feed.collection.items.iter().all(|n| n.is_read));
    }

    #[test]
    fn mark_read_decrements_by_matched_unread_only() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        feed.push(notif("n2", true));
        feed.push(notif("n3", false));
        // n2 is already read, n9 is not loaded; only n1 counts.
        feed.mark_read(&[
            "n1".to_string(),
            "n2".to_string(),
            "n9".to_string(),
        ]);
        assert_eq!(feed.unread_count(), 1);
        assert!(feed.collection.get("n1").unwrap().is_read);
        assert!(!feed.collection.get("n3").unwrap().is_read);
    }

    #[test]
    fn repeated_mark_read_is_idempotent() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        feed.mark_read(&["n1".to_string()]);
        feed.mark_read(&["n1".to_string()]);
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn counter_stays_in_bounds_under_interleaving() {
        let mut feed = NotificationFeed::new(50);
        for i in 0..10 {
            feed.push(notif(&format!("a{i}"), false));
            if i % 3 == 0 {
                feed.mark_read(&[format!("a{i}")]);
            }
        }
        let loaded = feed.collection.items.len() as u64;
        assert!(feed.unread_count() <= loaded);
        assert_eq!(feed.unread_count(), feed.loaded_unread());
    }

    #[test]
    fn resync_overrides_local_counter() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        // Server knows about unread items beyond the loaded page.
        feed.resync_unread(12);
        assert_eq!(feed.unread_count(), 12);
    }

    #[test]
    fn backlog_dedups_and_resyncs_counter() {
        let mut feed = NotificationFeed::new(20);
        feed.push(notif("n1", false));
        feed.apply_backlog(vec![notif("n1", false), notif("n2", false), notif("n3", true)], 2);
        assert_eq!(feed.collection.items.len(), 3);
        assert_eq!(feed.unread_count(), 2);
    }
}
