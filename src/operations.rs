//! Domain operations on [`Skillforge`]: list fetches and optimistic
//! mutation round-trips against the REST surface, plus the commands
//! that go out over the push channel.
//!
//! Every mutation follows the same shape: apply the provisional change
//! to the store, send the request, then resolve with the server's
//! authoritative entity or roll the change back. Loading flags are
//! scoped to the operation kind, and a server-provided error message is
//! surfaced verbatim into the slice's `error`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use skillforge_rust_api::{ApiError, UnreadCount};
use skillforge_rust_realtime::{ClientCommand, SyncError};
use skillforge_rust_store::{
    ContentReport, Course, CourseStatus, Notification, Operation, Payout, ReportStatus, Ticket,
    TicketStatus,
};

use crate::error::Error;
use crate::Skillforge;

#[derive(Serialize)]
struct StatusBody<S: Serialize> {
    status: S,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<u64>,
}

impl Skillforge {
    // ---- courses ---------------------------------------------------

    pub async fn fetch_courses(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .courses
            .set_loading(Operation::Fetch, true);
        let result = self.api.get_list::<Course>("/api/courses", &filters).await;
        let mut store = self.store.write().await;
        store.courses.set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store.courses.apply_page(list.items, list.pagination, filters);
                store.courses.summary = list.summary;
                Ok(())
            }
            Err(e) => {
                store.courses.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn create_course(
        &self,
        title: &str,
        instructor_id: &str,
        price_cents: u64,
    ) -> Result<Course, Error> {
        let draft = Course::draft(title, instructor_id, price_cents);
        let temp = {
            let mut store = self.store.write().await;
            store.courses.set_loading(Operation::Create, true);
            store.courses.begin_create(draft.clone())
        };
        let result: Result<Course, ApiError> = self.api.post("/api/courses", &draft).await;
        let mut store = self.store.write().await;
        store.courses.set_loading(Operation::Create, false);
        match result {
            Ok(course) => {
                store.courses.resolve(&temp, course.clone());
                Ok(course)
            }
            Err(e) => {
                store.courses.rollback(&temp);
                store.courses.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn update_course(&self, id: &str, update: CourseUpdate) -> Result<Course, Error> {
        {
            let mut store = self.store.write().await;
            store.courses.begin_update(id, |c| {
                if let Some(title) = &update.title {
                    c.title = title.clone();
                }
                if let Some(price) = update.price_cents {
                    c.price_cents = price;
                }
            })?;
            store.courses.set_loading(Operation::Update, true);
        }
        let result: Result<Course, ApiError> =
            self.api.put(&format!("/api/courses/{id}"), &update).await;
        let mut store = self.store.write().await;
        store.courses.set_loading(Operation::Update, false);
        match result {
            Ok(course) => {
                store.courses.resolve(id, course.clone());
                Ok(course)
            }
            Err(e) => {
                store.courses.rollback(id);
                store.courses.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn change_course_status(
        &self,
        id: &str,
        status: CourseStatus,
    ) -> Result<Course, Error> {
        {
            let mut store = self.store.write().await;
            store.courses.begin_status_change(id, |c| c.status = status)?;
            store.courses.set_loading(Operation::StatusChange, true);
        }
        let result: Result<Course, ApiError> = self
            .api
            .patch(&format!("/api/courses/{id}/status"), &StatusBody { status })
            .await;
        let mut store = self.store.write().await;
        store.courses.set_loading(Operation::StatusChange, false);
        match result {
            Ok(course) => {
                store.courses.resolve(id, course.clone());
                Ok(course)
            }
            Err(e) => {
                store.courses.rollback(id);
                store.courses.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn delete_course(&self, id: &str) -> Result<(), Error> {
        {
            let mut store = self.store.write().await;
            store.courses.begin_delete(id)?;
            store.courses.set_loading(Operation::Delete, true);
        }
        let result: Result<serde_json::Value, ApiError> =
            self.api.delete(&format!("/api/courses/{id}")).await;
        let mut store = self.store.write().await;
        store.courses.set_loading(Operation::Delete, false);
        match result {
            Ok(_) => {
                store.courses.resolve_delete(id);
                Ok(())
            }
            Err(e) => {
                store.courses.rollback(id);
                store.courses.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    // ---- support tickets -------------------------------------------

    pub async fn fetch_tickets(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .tickets
            .set_loading(Operation::Fetch, true);
        let result = self.api.get_list::<Ticket>("/api/tickets", &filters).await;
        let mut store = self.store.write().await;
        store.tickets.set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store.tickets.apply_page(list.items, list.pagination, filters);
                store.tickets.summary = list.summary;
                Ok(())
            }
            Err(e) => {
                store.tickets.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn open_ticket(&self, subject: &str, requester_id: &str) -> Result<Ticket, Error> {
        let draft = Ticket::open(subject, requester_id);
        let temp = {
            let mut store = self.store.write().await;
            store.tickets.set_loading(Operation::Create, true);
            store.tickets.begin_create(draft.clone())
        };
        let result: Result<Ticket, ApiError> = self.api.post("/api/tickets", &draft).await;
        let mut store = self.store.write().await;
        store.tickets.set_loading(Operation::Create, false);
        match result {
            Ok(ticket) => {
                store.tickets.resolve(&temp, ticket.clone());
                Ok(ticket)
            }
            Err(e) => {
                store.tickets.rollback(&temp);
                store.tickets.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn change_ticket_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<Ticket, Error> {
        {
            let mut store = self.store.write().await;
            store.tickets.begin_status_change(id, |t| t.status = status)?;
            store.tickets.set_loading(Operation::StatusChange, true);
        }
        let result: Result<Ticket, ApiError> = self
            .api
            .patch(&format!("/api/tickets/{id}/status"), &StatusBody { status })
            .await;
        let mut store = self.store.write().await;
        store.tickets.set_loading(Operation::StatusChange, false);
        match result {
            Ok(ticket) => {
                store.tickets.resolve(id, ticket.clone());
                Ok(ticket)
            }
            Err(e) => {
                store.tickets.rollback(id);
                store.tickets.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    // ---- announcements ---------------------------------------------

    pub async fn fetch_announcements(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .announcements
            .set_loading(Operation::Fetch, true);
        let result = self
            .api
            .get_list("/api/announcements", &filters)
            .await;
        let mut store = self.store.write().await;
        store.announcements.set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store
                    .announcements
                    .apply_page(list.items, list.pagination, filters);
                store.announcements.summary = list.summary;
                Ok(())
            }
            Err(e) => {
                store.announcements.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    // ---- payouts ---------------------------------------------------

    pub async fn fetch_payouts(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .payouts
            .set_loading(Operation::Fetch, true);
        let result = self.api.get_list::<Payout>("/api/payouts", &filters).await;
        let mut store = self.store.write().await;
        store.payouts.set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store.payouts.apply_page(list.items, list.pagination, filters);
                store.payouts.summary = list.summary;
                Ok(())
            }
            Err(e) => {
                store.payouts.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    /// Request a payout. The available balance in the payout summary is
    /// debited optimistically; on failure the exact recorded amount is
    /// credited back, so the balance never drifts.
    pub async fn request_payout(
        &self,
        instructor_id: &str,
        amount_cents: u64,
    ) -> Result<Payout, Error> {
        let draft = Payout::request(instructor_id, amount_cents);
        let temp = {
            let mut store = self.store.write().await;
            store.payouts.set_loading(Operation::Create, true);
            let temp = store.payouts.begin_create(draft.clone());
            store
                .payouts
                .record_summary_delta(&temp, "availableBalance", -(amount_cents as f64))?;
            temp
        };
        let result: Result<Payout, ApiError> = self.api.post("/api/payouts", &draft).await;
        let mut store = self.store.write().await;
        store.payouts.set_loading(Operation::Create, false);
        match result {
            Ok(payout) => {
                store.payouts.resolve(&temp, payout.clone());
                Ok(payout)
            }
            Err(e) => {
                store.payouts.rollback(&temp);
                store.payouts.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    // ---- content reports -------------------------------------------

    pub async fn fetch_reports(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .reports
            .set_loading(Operation::Fetch, true);
        let result = self.api.get_list("/api/reports", &filters).await;
        let mut store = self.store.write().await;
        store.reports.set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store.reports.apply_page(list.items, list.pagination, filters);
                store.reports.summary = list.summary;
                Ok(())
            }
            Err(e) => {
                store.reports.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    pub async fn review_report(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<ContentReport, Error> {
        {
            let mut store = self.store.write().await;
            store.reports.begin_status_change(id, |r| r.status = status)?;
            store.reports.set_loading(Operation::StatusChange, true);
        }
        let result: Result<ContentReport, ApiError> = self
            .api
            .patch(&format!("/api/reports/{id}/status"), &StatusBody { status })
            .await;
        let mut store = self.store.write().await;
        store.reports.set_loading(Operation::StatusChange, false);
        match result {
            Ok(report) => {
                store.reports.resolve(id, report.clone());
                Ok(report)
            }
            Err(e) => {
                store.reports.rollback(id);
                store.reports.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    // ---- notifications ---------------------------------------------

    pub async fn fetch_notifications(
        &self,
        filters: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.store
            .write()
            .await
            .notifications
            .collection
            .set_loading(Operation::Fetch, true);
        let result = self
            .api
            .get_list::<Notification>("/api/notifications", &filters)
            .await;
        let mut store = self.store.write().await;
        store
            .notifications
            .collection
            .set_loading(Operation::Fetch, false);
        match result {
            Ok(list) => {
                store
                    .notifications
                    .collection
                    .apply_page(list.items, list.pagination, filters);
                Ok(())
            }
            Err(e) => {
                store.notifications.collection.set_error(e.surface_message());
                Err(e.into())
            }
        }
    }

    /// Fetch the authoritative unread count and overwrite the local one.
    pub async fn resync_unread(&self) -> Result<u64, Error> {
        let unread: UnreadCount = self.api.get("/api/notifications/unread-count").await?;
        self.store
            .write()
            .await
            .notifications
            .resync_unread(unread.count);
        Ok(unread.count)
    }

    /// Mark notifications read: applied locally right away, then
    /// acknowledged over the channel, falling back to REST when the
    /// channel is down.
    pub async fn mark_notifications_read(&self, ids: Vec<String>) -> Result<(), Error> {
        self.store.write().await.notifications.mark_read(&ids);
        let command = ClientCommand::MarkNotificationsRead { ids: ids.clone() };
        match self.realtime.send_command(&command).await {
            Ok(()) => Ok(()),
            Err(SyncError::NotConnected) => {
                let _: serde_json::Value = self
                    .api
                    .post("/api/notifications/mark-read", &json!({ "ids": ids }))
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), Error> {
        self.store.write().await.notifications.mark_all_read();
        match self
            .realtime
            .send_command(&ClientCommand::MarkAllNotificationsRead)
            .await
        {
            Ok(()) => Ok(()),
            Err(SyncError::NotConnected) => {
                let _: serde_json::Value = self
                    .api
                    .post("/api/notifications/mark-all-read", &json!({}))
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ---- rooms, presence, moderation -------------------------------

    /// Join a course room; membership is tracked and re-joined after a
    /// reconnect.
    pub async fn join_course(&self, course_id: &str) -> Result<(), Error> {
        Ok(self.realtime.join_room(&course_room(course_id)).await?)
    }

    pub async fn leave_course(&self, course_id: &str) -> Result<(), Error> {
        Ok(self.realtime.leave_room(&course_room(course_id)).await?)
    }

    pub async fn send_typing(&self, course_id: &str) -> Result<(), Error> {
        let command = ClientCommand::Typing {
            room: course_room(course_id),
        };
        Ok(self.realtime.send_command(&command).await?)
    }

    pub async fn send_stopped_typing(&self, course_id: &str) -> Result<(), Error> {
        let command = ClientCommand::StoppedTyping {
            room: course_room(course_id),
        };
        Ok(self.realtime.send_command(&command).await?)
    }

    /// Relay an admin moderation action to the affected sessions.
    pub async fn moderation_action(
        &self,
        target_id: &str,
        action: &str,
        reason: Option<String>,
    ) -> Result<(), Error> {
        let command = ClientCommand::ModerationAction {
            target_id: target_id.to_string(),
            action: action.to_string(),
            reason,
        };
        Ok(self.realtime.send_command(&command).await?)
    }
}

fn course_room(course_id: &str) -> String {
    format!("course:{course_id}")
}
