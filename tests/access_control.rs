//! End-to-end access control over a live listener.

use axum::http::StatusCode;
use content_server::storage::seed::{DEV_PASSWORD, DEV_USERNAME};
use content_server::storage::Store;

mod common;

use common::{location, Browser, TestServer};

#[tokio::test]
async fn public_page_needs_no_session() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    let res = browser.get("/about").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert!(res.text().await.unwrap().contains("About this site"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn protected_page_opens_after_login() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    let res = browser.get("/secret").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.text().await.unwrap(), "Access denied");

    let res = browser.login(DEV_USERNAME, DEV_PASSWORD).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/admin");
    assert!(browser.has_cookie("auth"));

    assert_eq!(browser.get("/secret").await.status(), StatusCode::OK);
    assert_eq!(browser.get("/admin").await.status(), StatusCode::OK);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn admin_area_denies_anonymous_callers() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    for path in ["/admin", "/admin/pages", "/admin/users", "/admin/groups", "/admin/status"] {
        assert_eq!(browser.get(path).await.status(), StatusCode::FORBIDDEN, "{path}");
    }
    let res = browser.post("/admin/pages/delete", &[("uuid", "anything")]).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    let res = browser.get("/no/such/page").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "404 page not found");
    assert_eq!(browser.get("/admin/no-such-tool").await.status(), StatusCode::NOT_FOUND);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn wrong_password_shows_error_once() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    let res = browser.login(DEV_USERNAME, "not-the-password").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
    assert!(!browser.has_cookie("auth"));

    let first = browser.get("/login").await.text().await.unwrap();
    assert!(first.contains("Username or password incorrect..."));
    let second = browser.get("/login").await.text().await.unwrap();
    assert!(!second.contains("Username or password incorrect..."));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn login_token_cannot_be_replayed() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    let html = browser.get("/login").await.text().await.unwrap();
    let token = common::hidden_value(&html, "formhash");
    let form = [
        ("formname", "loginform"),
        ("formhash", token.as_str()),
        ("username", DEV_USERNAME),
        ("password", DEV_PASSWORD),
    ];

    let res = browser.post("/login", &form).await;
    assert_eq!(location(&res), "/admin");
    browser.get("/logout").await;

    let replay = browser.post("/login", &form).await;
    assert_eq!(location(&replay), "/login");
    assert!(!browser.has_cookie("auth"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);

    browser.login(DEV_USERNAME, DEV_PASSWORD).await;
    let stolen = browser_cookie(&browser);
    assert_eq!(server.store.sessions().unwrap().len(), 1);

    let res = browser.get("/logout").await;
    assert_eq!(location(&res), "/login");
    assert!(!browser.has_cookie("auth"));
    assert!(server.store.sessions().unwrap().is_empty());

    // The old cookie names a session that no longer exists.
    let mut replayer = Browser::new(&server);
    replayer.set_raw_cookie("auth", &stolen);
    let res = replayer.get("/secret").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!replayer.has_cookie("auth"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn forged_cookie_is_denied_and_cleared() {
    let server = TestServer::start(false).await;
    let mut browser = Browser::new(&server);
    browser.set_raw_cookie("auth", "7b7d.0000");

    let res = browser.get("/admin").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(!browser.has_cookie("auth"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn second_login_invalidates_first_token() {
    let server = TestServer::start(false).await;
    let mut first = Browser::new(&server);
    let mut second = Browser::new(&server);

    first.login(DEV_USERNAME, DEV_PASSWORD).await;
    assert_eq!(first.get("/secret").await.status(), StatusCode::OK);

    second.login(DEV_USERNAME, DEV_PASSWORD).await;
    assert_eq!(second.get("/secret").await.status(), StatusCode::OK);
    assert_eq!(first.get("/secret").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.store.sessions().unwrap().len(), 1);

    server.stop().await.unwrap();
}

fn browser_cookie(browser: &Browser) -> String {
    browser.cookie("auth").expect("no auth cookie").to_string()
}
