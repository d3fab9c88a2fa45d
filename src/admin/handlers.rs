use std::collections::HashSet;

use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::views::{self, DashboardCounts};
use crate::http::response::{not_found, AppError};
use crate::http::server::AppState;
use crate::routing::matcher::{is_admin_path, is_mappable_route};
use crate::routing::RebuildTrigger;
use crate::sessions::auth::hash_password;
use crate::sessions::CurrentUser;
use crate::storage::{unix_now, Page, StoreError, User, UserRole};

use super::AdminRoute;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub table_generation: u64,
    pub routes: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let (table_generation, routes) = state
        .tables
        .upgrade()
        .map(|tables| {
            let table = tables.current();
            (table.generation(), table.entries().len())
        })
        .unwrap_or_default();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        table_generation,
        routes,
    })
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let (generation, routes) = state
        .tables
        .upgrade()
        .map(|tables| {
            let table = tables.current();
            (table.generation(), table.entries().len())
        })
        .unwrap_or_default();

    let counts = DashboardCounts {
        pages: store.pages()?.len(),
        users: store.users()?.len(),
        groups: store.groups()?.len(),
        sessions: store.sessions()?.len(),
        routes,
        generation,
    };
    Ok(Html(views::dashboard(&current.user, &counts)).into_response())
}

// --- Users ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewUserForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_repeat: String,
}

/// Words of letters and digits, joined by single spaces, dashes or
/// underscores.
fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .split([' ', '-', '_'])
            .all(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Validate a submitted user form into a record with a fresh uuid.
pub fn new_user_from_form(form: &NewUserForm, role: UserRole) -> Result<User, &'static str> {
    let required = [
        &form.first_name,
        &form.last_name,
        &form.username,
        &form.email,
        &form.password,
        &form.password_repeat,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err("All fields are required");
    }
    if !valid_username(&form.username) {
        return Err("Username may only contain letters, digits, and single separators");
    }
    if !valid_email(&form.email) {
        return Err("Email address is not valid");
    }
    if form.password != form.password_repeat {
        return Err("Passwords do not match");
    }

    Ok(User {
        uuid: uuid::Uuid::new_v4().to_string(),
        username: form.username.clone(),
        auth_hash: hash_password(&form.password),
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.clone(),
        role,
        created_at: unix_now(),
    })
}

pub async fn list_users(State(state): State<AppState>) -> Result<Response, AppError> {
    let mut users = state.store.users()?;
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(Html(views::users(&users)).into_response())
}

pub async fn new_user_page() -> Html<String> {
    Html(views::new_user(None))
}

pub async fn create_user(
    State(state): State<AppState>,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    let user = match new_user_from_form(&form, UserRole::Regular) {
        Ok(user) => user,
        Err(message) => return Ok(Html(views::new_user(Some(message))).into_response()),
    };
    match state.store.insert_user(user) {
        Ok(()) => {
            tracing::info!(username = %form.username, "User created");
            Ok(Redirect::to(AdminRoute::Users.pattern()).into_response())
        }
        Err(StoreError::Conflict { .. }) => {
            Ok(Html(views::new_user(Some("Username is already taken"))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

fn selected_uuids(fields: Vec<(String, String)>) -> Vec<String> {
    fields
        .into_iter()
        .filter(|(key, _)| key == "uuid")
        .map(|(_, value)| value)
        .collect()
}

pub async fn delete_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let authors: HashSet<String> = store.pages()?.into_iter().map(|p| p.author_uuid).collect();

    for uuid in selected_uuids(fields) {
        let Some(user) = store.user_by_uuid(&uuid)? else {
            continue;
        };
        if user.role == UserRole::Root || user.uuid == current.user.uuid || authors.contains(&user.uuid) {
            tracing::warn!(username = %user.username, "Refusing to delete protected user");
            continue;
        }
        if let Some(session) = store.session_by_user(&user.uuid)? {
            store.delete_session(&session.session_id)?;
        }
        store.delete_user(&user.uuid)?;
        tracing::info!(username = %user.username, "User deleted");
    }
    Ok(Redirect::to(AdminRoute::Users.pattern()).into_response())
}

// --- Pages ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageForm {
    pub title: String,
    pub route: String,
    pub content: String,
    /// Checkbox: present when ticked.
    pub role_protected: Option<String>,
}

fn check_route(route: &str) -> Result<(), &'static str> {
    if !is_mappable_route(route) {
        return Err("Route must start with / and contain no spaces, braces, wildcards or parameters");
    }
    if is_admin_path(route) || AdminRoute::ALL.iter().any(|r| r.pattern() == route) {
        return Err("Route is reserved");
    }
    Ok(())
}

pub async fn list_pages(State(state): State<AppState>) -> Result<Response, AppError> {
    let mut pages = state.store.pages()?;
    pages.sort_by(|a, b| a.route.cmp(&b.route));
    Ok(Html(views::pages(&pages)).into_response())
}

pub async fn new_page_form() -> Html<String> {
    Html(views::page_form(None, None))
}

pub async fn create_page(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<PageForm>,
) -> Result<Response, AppError> {
    let page = Page {
        uuid: uuid::Uuid::new_v4().to_string(),
        author_uuid: current.user.uuid.clone(),
        title: form.title.trim().to_string(),
        route: form.route.trim().to_string(),
        content: form.content,
        role_protected: form.role_protected.is_some(),
        created_at: unix_now(),
    };
    if let Err(message) = check_route(&page.route) {
        return Ok(Html(views::page_form(Some(&page), Some(message))).into_response());
    }

    match state.store.insert_page(page.clone()) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Ok(Html(views::page_form(Some(&page), Some("Another page already uses this route"))).into_response());
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(route = %page.route, "Page created");
    state.rebuild_routes(RebuildTrigger::Content).await;
    Ok(Redirect::to(AdminRoute::Pages.pattern()).into_response())
}

pub async fn edit_page_form(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Response, AppError> {
    match state.store.page_by_uuid(&uuid)? {
        Some(page) => Ok(Html(views::page_form(Some(&page), None)).into_response()),
        None => Ok(not_found().await),
    }
}

pub async fn update_page(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Form(form): Form<PageForm>,
) -> Result<Response, AppError> {
    let Some(existing) = state.store.page_by_uuid(&uuid)? else {
        return Ok(not_found().await);
    };
    let page = Page {
        title: form.title.trim().to_string(),
        route: form.route.trim().to_string(),
        content: form.content,
        role_protected: form.role_protected.is_some(),
        ..existing
    };
    if let Err(message) = check_route(&page.route) {
        return Ok(Html(views::page_form(Some(&page), Some(message))).into_response());
    }

    match state.store.update_page(page.clone()) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Ok(Html(views::page_form(Some(&page), Some("Another page already uses this route"))).into_response());
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(route = %page.route, "Page updated");
    state.rebuild_routes(RebuildTrigger::Content).await;
    Ok(Redirect::to(AdminRoute::Pages.pattern()).into_response())
}

pub async fn delete_pages(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let mut removed = 0;
    for uuid in selected_uuids(fields) {
        if state.store.delete_page(&uuid)? {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, "Pages deleted");
        state.rebuild_routes(RebuildTrigger::Content).await;
    }
    Ok(Redirect::to(AdminRoute::Pages.pattern()).into_response())
}

// --- Groups ---

pub async fn list_groups(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let mut groups = store.groups()?;
    groups.sort_by(|a, b| a.title.cmp(&b.title));

    let mut listing = Vec::with_capacity(groups.len());
    for group in groups {
        let mut members = Vec::new();
        for membership in store.group_members(&group.uuid)? {
            if let Some(user) = store.user_by_uuid(&membership.user_uuid)? {
                members.push(user.username);
            }
        }
        members.sort();
        listing.push((group, members));
    }
    Ok(Html(views::groups(&listing)).into_response())
}
