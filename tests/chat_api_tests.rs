//! End-to-end tests for the `/chat` REST API: a real server on an ephemeral
//! port, driven over HTTP with blocking `ureq` calls.

use serde_json::{json, Value};
use tokio::sync::oneshot;

use practicum_chat::storage::{Role, Storage};
use practicum_chat::web::router::build_router;
use practicum_chat::web::state::AppState;

struct TestUser {
    id: i64,
    token: String,
}

struct Fixture {
    base_url: String,
    shutdown_tx: oneshot::Sender<()>,
    student: TestUser,
    teacher: TestUser,
    supervisor: TestUser,
}

async fn start_server() -> Fixture {
    let storage = Storage::open_in_memory().expect("open storage");
    let mut users = Vec::new();
    for (name, role) in [
        ("lerato", Role::Student),
        ("mr_dube", Role::Teacher),
        ("dr_pillay", Role::Supervisor),
    ] {
        let (user, token) = storage
            .create_user(name, &format!("{name} full"), role, None)
            .expect("create user");
        users.push(TestUser { id: user.id, token });
    }

    let app = build_router(AppState::shared(storage));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind server");
    let addr = listener.local_addr().expect("server addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });

    let supervisor = users.pop().expect("supervisor");
    let teacher = users.pop().expect("teacher");
    let student = users.pop().expect("student");
    Fixture {
        base_url: format!("http://{}", addr),
        shutdown_tx,
        student,
        teacher,
        supervisor,
    }
}

/// Issue a request and return the status and parsed envelope, for both
/// success and error statuses.
fn call(method: &str, url: &str, token: Option<&str>, body: Option<Value>) -> (u16, Value) {
    let mut req = ureq::request(method, url);
    if let Some(t) = token {
        req = req.set("Authorization", &format!("Bearer {t}"));
    }
    let result = match body {
        Some(b) => req.send_json(b),
        None => req.call(),
    };
    match result {
        Ok(resp) => {
            let status = resp.status();
            (status, resp.into_json().expect("json body"))
        }
        Err(ureq::Error::Status(code, resp)) => (code, resp.into_json().expect("json body")),
        Err(e) => panic!("transport error: {e}"),
    }
}

fn send(base: &str, from: &TestUser, to: &TestUser, text: &str) -> Value {
    let (status, body) = call(
        "POST",
        &format!("{base}/chat/messages"),
        Some(&from.token),
        Some(json!({ "receiver_id": to.id, "message": text })),
    );
    assert_eq!(status, 201, "send failed: {body}");
    assert_eq!(body["success"], true);
    body["data"].clone()
}

#[tokio::test]
async fn send_reply_and_read_history() {
    let fx = start_server().await;
    let base = fx.base_url.clone();

    tokio::task::spawn_blocking(move || {
        let hi = send(&base, &fx.student, &fx.teacher, "hi");
        assert_eq!(hi["sender_id"], fx.student.id);
        assert_eq!(hi["receiver_role"], "teacher");
        assert_eq!(hi["message_type"], "text");
        let hello = send(&base, &fx.teacher, &fx.student, "hello");

        // One conversation for the pair, pointing at the reply
        let (status, convs) = call(
            "GET",
            &format!("{base}/chat/conversations"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 200);
        let list = convs["data"].as_array().expect("conversation list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["other_user_id"], fx.teacher.id);
        assert_eq!(list[0]["last_message_id"], hello["id"]);
        assert_eq!(list[0]["last_message"], "hello");
        assert_eq!(list[0]["unread_count"], 1);

        // History is oldest first and clears the student's unread
        let (status, history) = call(
            "GET",
            &format!("{base}/chat/messages/{}", fx.teacher.id),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 200);
        let bodies: Vec<&str> = history["data"]
            .as_array()
            .expect("history")
            .iter()
            .map(|m| m["message"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(bodies, vec!["hi", "hello"]);

        let (_, unread) = call(
            "GET",
            &format!("{base}/chat/unread-count"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(unread["data"]["unread_count"], 0);

        // The teacher still has "hi" unread
        let (_, unread) = call(
            "GET",
            &format!("{base}/chat/unread-count"),
            Some(&fx.teacher.token),
            None,
        );
        assert_eq!(unread["data"]["unread_count"], 1);

        fx.shutdown_tx.send(()).ok();
    })
    .await
    .expect("scenario task");
}

#[tokio::test]
async fn mark_read_and_delete_enforce_ownership() {
    let fx = start_server().await;
    let base = fx.base_url.clone();

    tokio::task::spawn_blocking(move || {
        let msg = send(&base, &fx.student, &fx.supervisor, "lesson plan attached");
        let id = msg["id"].as_i64().expect("message id");

        // Only the receiver can mark read, and only once
        let url = format!("{base}/chat/messages/{id}/read");
        let (status, body) = call("PUT", &url, Some(&fx.student.token), None);
        assert_eq!(status, 404);
        assert_eq!(body["success"], false);
        let (status, _) = call("PUT", &url, Some(&fx.supervisor.token), None);
        assert_eq!(status, 200);
        let (status, _) = call("PUT", &url, Some(&fx.supervisor.token), None);
        assert_eq!(status, 404);

        // Only the sender can delete
        let url = format!("{base}/chat/messages/{id}");
        let (status, body) = call("DELETE", &url, Some(&fx.supervisor.token), None);
        assert_eq!(status, 404);
        assert_eq!(body["message"], "Message not found");
        let (status, body) = call("DELETE", &url, Some(&fx.student.token), None);
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);

        let (_, history) = call(
            "GET",
            &format!("{base}/chat/messages/{}", fx.student.id),
            Some(&fx.supervisor.token),
            None,
        );
        assert!(history["data"].as_array().expect("history").is_empty());

        fx.shutdown_tx.send(()).ok();
    })
    .await
    .expect("scenario task");
}

#[tokio::test]
async fn validation_and_auth_errors_use_envelope() {
    let fx = start_server().await;
    let base = fx.base_url.clone();

    tokio::task::spawn_blocking(move || {
        let url = format!("{base}/chat/messages");

        let (status, body) = call("POST", &url, None, Some(json!({ "receiver_id": 2 })));
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);

        let (status, _) = call("GET", &format!("{base}/chat/users"), Some("bogus"), None);
        assert_eq!(status, 401);

        let (status, body) = call(
            "POST",
            &url,
            Some(&fx.student.token),
            Some(json!({ "receiver_id": fx.teacher.id, "message": "   " })),
        );
        assert_eq!(status, 400);
        assert_eq!(body["message"], "Receiver ID and message are required");

        let (status, _) = call(
            "POST",
            &url,
            Some(&fx.student.token),
            Some(json!({ "message": "who?" })),
        );
        assert_eq!(status, 400);

        let (status, _) = call(
            "POST",
            &url,
            Some(&fx.student.token),
            Some(json!({ "receiver_id": 9999, "message": "anyone?" })),
        );
        assert_eq!(status, 404);

        let (status, _) = call(
            "POST",
            &url,
            Some(&fx.student.token),
            Some(json!({ "receiver_id": fx.teacher.id, "message": "x", "message_type": "video" })),
        );
        assert_eq!(status, 400);

        let (status, body) = call(
            "GET",
            &format!("{base}/chat/messages/not-a-number"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);

        let (status, _) = call(
            "GET",
            &format!("{base}/chat/search?q=%20"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 400);

        fx.shutdown_tx.send(()).ok();
    })
    .await
    .expect("scenario task");
}

#[tokio::test]
async fn search_directory_and_archive() {
    let fx = start_server().await;
    let base = fx.base_url.clone();

    tokio::task::spawn_blocking(move || {
        send(&base, &fx.student, &fx.teacher, "Week 3 LESSON plan");
        send(&base, &fx.teacher, &fx.student, "lesson approved");
        send(&base, &fx.teacher, &fx.supervisor, "lesson observation notes");

        let (status, found) = call(
            "GET",
            &format!("{base}/chat/search?q=lesson"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 200);
        let bodies: Vec<&str> = found["data"]
            .as_array()
            .expect("results")
            .iter()
            .map(|m| m["message"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(bodies, vec!["lesson approved", "Week 3 LESSON plan"]);

        let (_, users) = call(
            "GET",
            &format!("{base}/chat/users"),
            Some(&fx.student.token),
            None,
        );
        let dir = users["data"].as_array().expect("directory");
        assert_eq!(dir.len(), 2);
        assert_eq!(dir[0]["role_label"], "Supervisor");
        assert_eq!(dir[1]["role_label"], "Teacher");

        let (_, me) = call("GET", &format!("{base}/chat/me"), Some(&fx.student.token), None);
        assert_eq!(me["data"]["id"], fx.student.id);

        let archive = format!("{base}/chat/conversations/{}/archive", fx.student.id);
        let (status, _) = call("PUT", &archive, Some(&fx.teacher.token), None);
        assert_eq!(status, 200);
        let (_, convs) = call(
            "GET",
            &format!("{base}/chat/conversations"),
            Some(&fx.teacher.token),
            None,
        );
        let list = convs["data"].as_array().expect("conversations");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["other_user_id"], fx.supervisor.id);

        let missing = format!("{base}/chat/conversations/{}/archive", fx.teacher.id);
        let (status, _) = call("PUT", &missing, Some(&fx.teacher.token), None);
        assert_eq!(status, 404);

        let restore = format!("{base}/chat/conversations/{}/unarchive", fx.student.id);
        let (status, _) = call("PUT", &restore, Some(&fx.teacher.token), None);
        assert_eq!(status, 200);

        let (status, health) = call("GET", &format!("{base}/health"), None, None);
        assert_eq!(status, 200);
        assert_eq!(health["data"]["messages"], 3);
        assert_eq!(health["data"]["conversations"], 2);

        fx.shutdown_tx.send(()).ok();
    })
    .await
    .expect("scenario task");
}

#[tokio::test]
async fn oversized_body_and_paged_queries() {
    let fx = start_server().await;
    let base = fx.base_url.clone();

    tokio::task::spawn_blocking(move || {
        let long = "a".repeat(10_001);
        let (status, body) = call(
            "POST",
            &format!("{base}/chat/messages"),
            Some(&fx.student.token),
            Some(json!({ "receiver_id": fx.teacher.id, "message": long })),
        );
        assert_eq!(status, 400);
        assert_eq!(body["message"], "Message exceeds 10000 characters");

        let mut ids = Vec::new();
        for i in 0..4 {
            let msg = send(&base, &fx.student, &fx.teacher, &format!("draft {i}"));
            ids.push(msg["id"].as_i64().expect("message id"));
        }

        let bodies = |v: &Value| -> Vec<String> {
            v["data"]
                .as_array()
                .expect("message list")
                .iter()
                .map(|m| m["message"].as_str().unwrap_or_default().to_string())
                .collect()
        };

        // One message strictly before the third
        let (status, page) = call(
            "GET",
            &format!("{base}/chat/messages/{}?limit=1&before={}", fx.student.id, ids[2]),
            Some(&fx.teacher.token),
            None,
        );
        assert_eq!(status, 200);
        assert_eq!(bodies(&page), vec!["draft 1"]);

        // Offset skips the newest, result still oldest first
        let (_, page) = call(
            "GET",
            &format!("{base}/chat/messages/{}?limit=2&offset=1", fx.student.id),
            Some(&fx.teacher.token),
            None,
        );
        assert_eq!(bodies(&page), vec!["draft 1", "draft 2"]);

        let (status, _) = call(
            "GET",
            &format!("{base}/chat/messages/{}?limit=abc", fx.student.id),
            Some(&fx.teacher.token),
            None,
        );
        assert_eq!(status, 400);

        // Search pages newest first
        let (status, found) = call(
            "GET",
            &format!("{base}/chat/search?q=DRAFT&limit=2&offset=1"),
            Some(&fx.student.token),
            None,
        );
        assert_eq!(status, 200);
        assert_eq!(bodies(&found), vec!["draft 2", "draft 1"]);

        fx.shutdown_tx.send(()).ok();
    })
    .await
    .expect("scenario task");
}
