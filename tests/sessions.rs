//! Session aging and sweeping against a running server.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use content_server::sessions::SessionSweeper;
use content_server::storage::seed::{DEV_PASSWORD, DEV_USERNAME};
use content_server::storage::{AuthSession, MemoryStore, Store};

mod common;

use common::{Browser, TestServer};

#[test]
fn session_survives_nineteen_minutes_but_not_twenty_one() {
    let t0 = 1_700_000_000;
    let store = Arc::new(MemoryStore::in_memory());
    store
        .insert_session(AuthSession {
            session_id: "s-1".to_string(),
            user_uuid: "u-1".to_string(),
            created_at: t0,
            last_active_at: t0,
        })
        .unwrap();
    let sweeper = SessionSweeper::new(store.clone(), Duration::from_secs(60), Duration::from_secs(20 * 60));

    sweeper.sweep_at(t0 + 19 * 60);
    assert!(store.session_by_id("s-1").unwrap().is_some());

    sweeper.sweep_at(t0 + 21 * 60);
    assert!(store.session_by_id("s-1").unwrap().is_none());
}

#[tokio::test]
async fn swept_session_no_longer_opens_protected_pages() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);
    browser.login(DEV_USERNAME, DEV_PASSWORD).await;
    assert_eq!(browser.get("/secret").await.status(), StatusCode::OK);

    let session = server.store.sessions().unwrap().remove(0);
    let sweeper = SessionSweeper::new(server.store.clone(), Duration::from_secs(60), Duration::from_secs(60));
    assert_eq!(sweeper.sweep_at(session.created_at + 61), 1);

    let res = browser.get("/secret").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!browser.has_cookie("auth"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn activity_is_recorded_on_protected_requests() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);
    browser.login(DEV_USERNAME, DEV_PASSWORD).await;

    let before = server.store.sessions().unwrap().remove(0);
    // Activity is tracked in whole seconds.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    browser.get("/admin").await;
    let after = server.store.session_by_id(&before.session_id).unwrap().unwrap();

    assert!(after.last_active_at > before.last_active_at);
    assert_eq!(after.created_at, before.created_at);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn deleting_a_user_ends_their_session() {
    let server = TestServer::start(false).await;
    let mut admin = Browser::new(&server);
    admin.login(DEV_USERNAME, DEV_PASSWORD).await;

    let res = admin
        .post(
            "/admin/users/new",
            &[
                ("first_name", "Grace"),
                ("last_name", "Hopper"),
                ("username", "ghopper"),
                ("email", "grace@example.com"),
                ("password", "cobol"),
                ("password_repeat", "cobol"),
            ],
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let mut grace = Browser::new(&server);
    grace.login("ghopper", "cobol").await;
    assert_eq!(grace.get("/secret").await.status(), StatusCode::OK);

    let uuid = server.store.user_by_username("ghopper").unwrap().unwrap().uuid;
    admin.post("/admin/users/delete", &[("uuid", uuid.as_str())]).await;

    assert!(server.store.user_by_username("ghopper").unwrap().is_none());
    assert_eq!(grace.get("/secret").await.status(), StatusCode::FORBIDDEN);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn root_and_self_cannot_be_deleted() {
    let server = TestServer::start(false).await;
    let mut admin = Browser::new(&server);
    admin.login(DEV_USERNAME, DEV_PASSWORD).await;

    let root = server.store.user_by_username(DEV_USERNAME).unwrap().unwrap();
    admin.post("/admin/users/delete", &[("uuid", root.uuid.as_str())]).await;

    assert!(server.store.user_by_username(DEV_USERNAME).unwrap().is_some());
    assert_eq!(admin.get("/admin").await.status(), StatusCode::OK);

    server.stop().await.unwrap();
}
