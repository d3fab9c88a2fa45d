//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use content_server::config::AppConfig;
use content_server::lifecycle::startup::{Application, StartupError};
use content_server::routing::RouteTableManager;
use content_server::storage::{unix_now, MemoryStore, Page};

/// A running server on an ephemeral port with its own static directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub tables: Arc<RouteTableManager>,
    pub store: Arc<MemoryStore>,
    pub static_dir: TempDir,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), StartupError>>>,
}

impl TestServer {
    /// Start with dev seed data.
    pub async fn start(watch: bool) -> TestServer {
        Self::start_with(watch, |_| {}).await
    }

    /// Like `start`, with `prepare` populating the static directory before
    /// the first table is built.
    pub async fn start_with(watch: bool, prepare: impl FnOnce(&std::path::Path)) -> TestServer {
        let static_dir = tempfile::tempdir().unwrap();
        prepare(static_dir.path());

        let mut config = AppConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        config.server.shutdown_grace_secs = 2;
        config.static_assets.dir = static_dir.path().display().to_string();
        config.static_assets.watch = watch;
        config.sessions.secret = "integration-test-secret".to_string();

        let app = Application::build(config, true).await.unwrap();
        let addr = app.local_addr().unwrap();
        let tables = app.tables();
        let store = app.store();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(app.run_until(async move {
            let _ = stopped.await;
        }));

        TestServer {
            addr,
            tables,
            store,
            static_dir,
            stop: Some(stop),
            task: Some(task),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for it to complete.
    pub async fn stop(mut self) -> Result<(), StartupError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => tokio::time::timeout(Duration::from_secs(10), task)
                .await
                .expect("shutdown timed out")
                .expect("server task panicked"),
            None => Ok(()),
        }
    }
}

pub fn page(uuid: &str, route: &str, protected: bool) -> Page {
    Page {
        uuid: uuid.to_string(),
        author_uuid: "test-author".to_string(),
        title: format!("Title {uuid}"),
        route: route.to_string(),
        content: format!("<p>body of {uuid}</p>"),
        role_protected: protected,
        created_at: unix_now(),
    }
}

/// HTTP client that keeps cookies between requests and never follows
/// redirects.
pub struct Browser {
    client: reqwest::Client,
    base: String,
    cookies: BTreeMap<String, String>,
}

impl Browser {
    pub fn new(server: &TestServer) -> Browser {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();
        Browser {
            client,
            base: format!("http://{}", server.addr),
            cookies: BTreeMap::new(),
        }
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set_raw_cookie(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn absorb(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            let (pair, attributes) = value.split_once(';').unwrap_or((value, ""));
            let (name, val) = pair.split_once('=').unwrap();
            if attributes.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), val.to_string());
            }
        }
    }

    pub async fn get(&mut self, path: &str) -> reqwest::Response {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if !self.cookies.is_empty() {
            request = request.header(COOKIE, self.cookie_header());
        }
        let response = request.send().await.expect("server unreachable");
        self.absorb(&response);
        response
    }

    pub async fn post(&mut self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        let mut request = self.client.post(format!("{}{}", self.base, path)).form(form);
        if !self.cookies.is_empty() {
            request = request.header(COOKIE, self.cookie_header());
        }
        let response = request.send().await.expect("server unreachable");
        self.absorb(&response);
        response
    }

    /// Fetch the login form and submit it with the given credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> reqwest::Response {
        let html = self.get("/login").await.text().await.unwrap();
        let token = hidden_value(&html, "formhash");
        let form_name = hidden_value(&html, "formname");
        self.post(
            "/login",
            &[
                ("formname", form_name.as_str()),
                ("formhash", token.as_str()),
                ("username", username),
                ("password", password),
            ],
        )
        .await
    }
}

/// Value of the hidden input called `name` in rendered HTML.
pub fn hidden_value(html: &str, name: &str) -> String {
    let marker = format!("name=\"{name}\" value=\"");
    let start = html.find(&marker).expect("hidden input missing") + marker.len();
    let end = html[start..].find('"').unwrap() + start;
    html[start..end].to_string()
}

pub fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
