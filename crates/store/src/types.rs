use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Behavior every collection entity must expose so the generic
/// optimistic machinery can track and replace it.
pub trait Entity: Clone + std::fmt::Debug {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    /// Bump the denormalized `updated_at` on a local optimistic mutation.
    fn touch(&mut self, at: DateTime<Utc>);
}

/// Synthesize a client-side placeholder id for a not-yet-confirmed create.
///
/// The random suffix keeps two creates in the same millisecond from
/// colliding.
pub fn temp_id() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("temp_{}_{:08x}", Utc::now().timestamp_millis(), suffix)
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with("temp_")
}

/// Course moderation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    #[default]
    Draft,
    UnderReview,
    Published,
    Rejected,
    Suspended,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
    Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CourseStatus,
    TicketReply,
    Announcement,
    Payout,
    Moderation,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub instructor_id: String,
    pub status: CourseStatus,
    #[serde(default)]
    pub price_cents: u64,
    #[serde(default)]
    pub enrolled_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// A draft course as created locally before server confirmation.
    pub fn draft(title: &str, instructor_id: &str, price_cents: u64) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.to_string(),
            instructor_id: instructor_id.to_string(),
            status: CourseStatus::default(),
            price_cents,
            enrolled_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub subject: String,
    pub requester_id: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub reply_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn open(subject: &str, requester_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            subject: subject.to_string(),
            requester_id: requester_id.to_string(),
            status: TicketStatus::default(),
            reply_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author_id: String,
    #[serde(default)]
    pub read_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: String,
    pub instructor_id: String,
    pub amount_cents: u64,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    pub fn request(instructor_id: &str, amount_cents: u64) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            instructor_id: instructor_id.to_string(),
            amount_cents,
            status: PayoutStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub id: String,
    pub target_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Id of the entity this notification refers to, when there is one
    /// (ticket id for ticket replies, course id for status changes).
    #[serde(default)]
    pub ref_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

macro_rules! impl_entity {
    ($($ty:ty),+ $(,)?) => {
        $(impl Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn touch(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }
        })+
    };
}

impl_entity!(Course, Ticket, Announcement, Payout, ContentReport, Notification);
