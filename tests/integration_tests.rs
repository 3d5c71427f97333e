use std::collections::HashMap;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skillforge_rust::{CourseStatus, Skillforge};

fn client_for(server: &MockServer) -> Skillforge {
    // The channel endpoint is never dialed in these tests; commands fall
    // back to REST or fail with NotConnected.
    Skillforge::new(&server.uri(), "ws://127.0.0.1:1/ws").expect("client")
}

fn course_json(id: &str, title: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "instructorId": "instructor-1",
        "status": status,
        "priceCents": 4900,
        "enrolledCount": 12,
        "createdAt": "2026-03-01T10:00:00Z",
        "updatedAt": "2026-03-02T10:00:00Z"
    })
}

fn list_envelope(items: Vec<serde_json::Value>, total: u64) -> serde_json::Value {
    let count = items.len() as u64;
    json!({
        "success": true,
        "data": {
            "items": items,
            "pagination": {
                "page": 1,
                "limit": 20,
                "total": total.max(count),
                "totalPages": 1,
                "hasNext": false,
                "hasPrev": false
            },
            "filters": {},
            "summary": {}
        }
    })
}

#[tokio::test]
async fn fetch_courses_populates_the_slice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/courses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_envelope(
            vec![
                course_json("course-1", "Intro to Rust", "PUBLISHED"),
                course_json("course-2", "Advanced Rust", "DRAFT"),
            ],
            2,
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.fetch_courses(HashMap::new()).await.expect("fetch");

    let store = client.store();
    let store = store.read().await;
    assert_eq!(store.courses.items.len(), 2);
    assert_eq!(store.courses.items[0].id, "course-1");
    assert_eq!(store.courses.items[0].status, CourseStatus::Published);
    assert_eq!(store.courses.pagination.total, 2);
    assert!(!store.courses.loading.fetching);
    assert!(store.courses.error.is_none());
}

#[tokio::test]
async fn create_course_resolves_the_provisional_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/courses"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true,
            "data": course_json("course-42", "Intro to Rust", "DRAFT")
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created = client
        .create_course("Intro to Rust", "instructor-1", 4900)
        .await
        .expect("create");
    assert_eq!(created.id, "course-42");

    let store = client.store();
    let store = store.read().await;
    assert_eq!(store.courses.items.len(), 1);
    assert_eq!(store.courses.items[0].id, "course-42");
    assert!(!store.courses.has_pending("course-42"));
    assert_eq!(store.courses.pagination.total, 1);
    assert!(!store.courses.loading.creating);
}

#[tokio::test]
async fn forbidden_create_rolls_back_and_surfaces_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "message": "Moderator approval required"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .open_ticket("Refund request", "user-9")
        .await
        .expect_err("should fail");
    assert_eq!(err.surface_message(), "Moderator approval required");

    let store = client.store();
    let store = store.read().await;
    assert!(store.tickets.items.is_empty());
    assert_eq!(store.tickets.pagination.total, 0);
    assert_eq!(
        store.tickets.error.as_deref(),
        Some("Moderator approval required")
    );
    assert!(!store.tickets.loading.creating);
}

#[tokio::test]
async fn failed_payout_restores_the_exact_balance_debit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "items": [],
                "pagination": {
                    "page": 1, "limit": 20, "total": 0,
                    "totalPages": 1, "hasNext": false, "hasPrev": false
                },
                "filters": {},
                "summary": { "availableBalance": 10000.0 }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payouts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Insufficient balance"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.fetch_payouts(HashMap::new()).await.expect("fetch");
    client
        .request_payout("instructor-1", 2500)
        .await
        .expect_err("should fail");

    let store = client.store();
    let store = store.read().await;
    assert!(store.payouts.items.is_empty());
    assert_eq!(store.payouts.summary.get("availableBalance"), Some(&10000.0));
    assert_eq!(store.payouts.error.as_deref(), Some("Insufficient balance"));
}

#[tokio::test]
async fn unread_resync_overwrites_the_local_counter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/unread-count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "count": 7 }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let count = client.resync_unread().await.expect("resync");
    assert_eq!(count, 7);

    let store = client.store();
    assert_eq!(store.read().await.notifications.unread_count(), 7);
}

#[tokio::test]
async fn mark_read_falls_back_to_rest_when_the_channel_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "items": [{
                    "id": "note-1",
                    "kind": "ticket_reply",
                    "title": "New reply",
                    "body": "A moderator replied to your ticket",
                    "refId": "ticket-1",
                    "isRead": false,
                    "createdAt": "2026-03-01T10:00:00Z",
                    "updatedAt": "2026-03-01T10:00:00Z"
                }],
                "pagination": {
                    "page": 1, "limit": 20, "total": 1,
                    "totalPages": 1, "hasNext": false, "hasPrev": false
                },
                "filters": {},
                "summary": {}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/mark-read"))
        .and(body_json(json!({ "ids": ["note-1"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .fetch_notifications(HashMap::new())
        .await
        .expect("fetch");
    {
        let store = client.store();
        store.write().await.notifications.resync_unread(1);
    }

    client
        .mark_notifications_read(vec!["note-1".to_string()])
        .await
        .expect("mark read");

    let store = client.store();
    let store = store.read().await;
    assert_eq!(store.notifications.unread_count(), 0);
    assert!(store.notifications.collection.items[0].is_read);
}
