//! Skillforge client-side state core
//!
//! This crate holds the reconciliation logic the Skillforge client runs
//! between its REST fetches and the push channel: paginated collections
//! with optimistic mutation tracking, the typed event union and its
//! dispatch, the unread-notification counter, and ephemeral presence
//! state. It has no I/O of its own and no UI dependency, so the whole
//! model is testable synchronously.

mod collection;
mod error;
mod event;
mod notifications;
pub mod pagination;
mod presence;
mod router;
mod types;

pub use collection::{CollectionState, LoadingFlags, Operation};
pub use error::StoreError;
pub use event::ServerEvent;
pub use notifications::NotificationFeed;
pub use pagination::{recompute_after_insertion, recompute_after_removal, Pagination};
pub use presence::{PresenceState, TYPING_TTL_MS};
pub use router::StoreState;
pub use types::{
    is_temp_id, temp_id, Announcement, ContentReport, Course, CourseStatus, Entity, Notification,
    NotificationKind, Payout, PayoutStatus, ReportStatus, Ticket, TicketStatus,
};
