use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

/// How long a typing indicator stays visible without a fresh event.
pub const TYPING_TTL_MS: i64 = 4_000;

/// Ephemeral per-room session state: online users and typing
/// indicators. Nothing here is a persisted collection; it is rebuilt
/// from presence events after every (re)connect.
///
/// Typing expiry is a deadline per (room, user) key. A newer typing
/// event overwrites the deadline, so no stale timer can ever clear a
/// fresher indicator; [`PresenceState::sweep`] is driven by a single
/// interval and the read side filters by deadline as well.
#[derive(Debug, Default)]
pub struct PresenceState {
    rooms: HashMap<String, HashSet<String>>,
    typing: HashMap<(String, String), DateTime<Utc>>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joined(&mut self, room: &str, user_id: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    pub fn left(&mut self, room: &str, user_id: &str) {
        if let Some(users) = self.rooms.get_mut(room) {
            users.remove(user_id);
            if users.is_empty() {
                self.rooms.remove(room);
            }
        }
        self.typing.remove(&(room.to_string(), user_id.to_string()));
    }

    pub fn online(&self, room: &str) -> Vec<&str> {
        self.rooms
            .get(room)
            .map(|users| users.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Record a typing event, refreshing the expiry deadline.
    pub fn typing(&mut self, room: &str, user_id: &str, now: DateTime<Utc>) {
        self.typing.insert(
            (room.to_string(), user_id.to_string()),
            now + Duration::milliseconds(TYPING_TTL_MS),
        );
    }

    /// An explicit stopped-typing signal clears the indicator at once.
    pub fn stopped_typing(&mut self, room: &str, user_id: &str) {
        self.typing.remove(&(room.to_string(), user_id.to_string()));
    }

    /// Users currently typing in `room`. Expired deadlines are filtered
    /// here too, so an indicator never outlives its TTL between sweeps.
    pub fn typing_in(&self, room: &str, now: DateTime<Utc>) -> Vec<&str> {
        self.typing
            .iter()
            .filter(|((r, _), deadline)| r == room && **deadline > now)
            .map(|((_, user), _)| user.as_str())
            .collect()
    }

    /// Drop expired typing indicators. Called on a timer; the indicator
    /// clears even if no stopped-typing event ever arrives.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.typing.retain(|_, deadline| *deadline > now);
    }

    /// Forget everything, e.g. when the transport drops. Presence is
    /// replayed by the server after rejoin.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.typing.clear();
    }
}
