//! HTML rendering for saved pages and the admin UI.
//!
//! Plain string templates; every interpolated value goes through `escape`.

use std::fmt::Write;

use crate::storage::{Group, Page, User, UserRole};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

fn admin_layout(title: &str, body: &str) -> String {
    let nav = "<nav><a href=\"/admin\">Dashboard</a> | <a href=\"/admin/pages\">Pages</a> | \
               <a href=\"/admin/users\">Users</a> | <a href=\"/admin/groups\">Groups</a> | \
               <a href=\"/logout\">Log out</a></nav>";
    layout(title, &format!("{}\n<h1>{}</h1>\n{}", nav, escape(title), body))
}

fn error_banner(message: Option<&str>) -> String {
    message
        .map(|m| format!("<p class=\"error\">{}</p>\n", escape(m)))
        .unwrap_or_default()
}

fn form_token(form_name: &str, token: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"formname\" value=\"{}\">\n<input type=\"hidden\" name=\"formhash\" value=\"{}\">\n",
        escape(form_name),
        escape(token)
    )
}

/// Stored page content is trusted markup written by an authenticated editor.
pub fn saved_page(page: &Page) -> String {
    layout(&page.title, &page.content)
}

pub fn login(form_name: &str, token: &str, error: Option<&str>) -> String {
    let body = format!(
        "<h1>Log in</h1>\n{}<form method=\"post\" action=\"/login\">\n{}\
         <label>Username <input name=\"username\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <button type=\"submit\">Log in</button>\n</form>",
        error_banner(error),
        form_token(form_name, token)
    );
    layout("Log in", &body)
}

fn user_fields() -> &'static str {
    "<label>First name <input name=\"first_name\"></label>\n\
     <label>Last name <input name=\"last_name\"></label>\n\
     <label>Username <input name=\"username\"></label>\n\
     <label>Email <input name=\"email\"></label>\n\
     <label>Password <input type=\"password\" name=\"password\"></label>\n\
     <label>Repeat password <input type=\"password\" name=\"password_repeat\"></label>\n"
}

pub fn setup(error: Option<&str>) -> String {
    let body = format!(
        "<h1>Create the root user</h1>\n{}<form method=\"post\" action=\"/setup\">\n{}\
         <button type=\"submit\">Create</button>\n</form>",
        error_banner(error),
        user_fields()
    );
    layout("Setup", &body)
}

pub struct DashboardCounts {
    pub pages: usize,
    pub users: usize,
    pub groups: usize,
    pub sessions: usize,
    pub routes: usize,
    pub generation: u64,
}

pub fn dashboard(current: &User, counts: &DashboardCounts) -> String {
    let body = format!(
        "<p>Logged in as {}.</p>\n<ul>\n<li>Pages: {}</li>\n<li>Users: {}</li>\n\
         <li>Groups: {}</li>\n<li>Active sessions: {}</li>\n<li>Routes: {} (table generation {})</li>\n</ul>",
        escape(&current.username),
        counts.pages,
        counts.users,
        counts.groups,
        counts.sessions,
        counts.routes,
        counts.generation
    );
    admin_layout("Dashboard", &body)
}

pub fn users(users: &[User]) -> String {
    let mut rows = String::new();
    for user in users {
        let role = match user.role {
            UserRole::Root => "root",
            UserRole::Regular => "regular",
        };
        let _ = writeln!(
            rows,
            "<tr><td><input type=\"checkbox\" name=\"uuid\" value=\"{}\"></td><td>{}</td><td>{} {}</td><td>{}</td><td>{}</td></tr>",
            escape(&user.uuid),
            escape(&user.username),
            escape(&user.first_name),
            escape(&user.last_name),
            escape(&user.email),
            role
        );
    }
    let body = format!(
        "<p><a href=\"/admin/users/new\">New user</a></p>\n\
         <form method=\"post\" action=\"/admin/users/delete\">\n<table>\n\
         <tr><th></th><th>Username</th><th>Name</th><th>Email</th><th>Role</th></tr>\n{}</table>\n\
         <button type=\"submit\">Delete selected</button>\n</form>",
        rows
    );
    admin_layout("Users", &body)
}

pub fn new_user(error: Option<&str>) -> String {
    let body = format!(
        "{}<form method=\"post\" action=\"/admin/users/new\">\n{}<button type=\"submit\">Create</button>\n</form>",
        error_banner(error),
        user_fields()
    );
    admin_layout("New user", &body)
}

pub fn pages(pages: &[Page]) -> String {
    let mut rows = String::new();
    for page in pages {
        let _ = writeln!(
            rows,
            "<tr><td><input type=\"checkbox\" name=\"uuid\" value=\"{uuid}\"></td><td><a href=\"/admin/pages/edit/{uuid}\">{}</a></td><td><a href=\"{route}\">{route}</a></td><td>{}</td></tr>",
            escape(&page.title),
            if page.role_protected { "protected" } else { "public" },
            uuid = escape(&page.uuid),
            route = escape(&page.route),
        );
    }
    let body = format!(
        "<p><a href=\"/admin/pages/new\">New page</a></p>\n\
         <form method=\"post\" action=\"/admin/pages/delete\">\n<table>\n\
         <tr><th></th><th>Title</th><th>Route</th><th>Access</th></tr>\n{}</table>\n\
         <button type=\"submit\">Delete selected</button>\n</form>",
        rows
    );
    admin_layout("Pages", &body)
}

/// Create (`page` is `None`) or edit form.
pub fn page_form(page: Option<&Page>, error: Option<&str>) -> String {
    let (action, title) = match page {
        Some(p) => (format!("/admin/pages/edit/{}", escape(&p.uuid)), "Edit page"),
        None => ("/admin/pages/new".to_string(), "New page"),
    };
    let field = |f: fn(&Page) -> &str| page.map(|p| escape(f(p))).unwrap_or_default();
    let checked = if page.is_some_and(|p| p.role_protected) { " checked" } else { "" };

    let body = format!(
        "{}<form method=\"post\" action=\"{}\">\n\
         <label>Title <input name=\"title\" value=\"{}\"></label>\n\
         <label>Route <input name=\"route\" value=\"{}\"></label>\n\
         <label><input type=\"checkbox\" name=\"role_protected\"{}> Requires login</label>\n\
         <textarea name=\"content\">{}</textarea>\n\
         <button type=\"submit\">Save</button>\n</form>",
        error_banner(error),
        action,
        field(|p| &p.title),
        field(|p| &p.route),
        checked,
        field(|p| &p.content),
    );
    admin_layout(title, &body)
}

pub fn groups(groups: &[(Group, Vec<String>)]) -> String {
    let mut items = String::new();
    for (group, members) in groups {
        let members: Vec<String> = members.iter().map(|m| escape(m)).collect();
        let _ = writeln!(
            items,
            "<li>{}: {}</li>",
            escape(&group.title),
            if members.is_empty() { "(no members)".to_string() } else { members.join(", ") }
        );
    }
    admin_layout("Groups", &format!("<ul>\n{}</ul>", items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn login_form_carries_token_and_error() {
        let html = login("loginform", "tok-1", Some("Username or password incorrect..."));
        assert!(html.contains("name=\"formhash\" value=\"tok-1\""));
        assert!(html.contains("Username or password incorrect..."));
        assert!(!login("loginform", "tok-1", None).contains("class=\"error\""));
    }

    #[test]
    fn saved_page_title_is_escaped() {
        let page = Page {
            uuid: "p".to_string(),
            author_uuid: "a".to_string(),
            title: "<script>".to_string(),
            route: "/x".to_string(),
            content: "<p>hello</p>".to_string(),
            role_protected: false,
            created_at: 0,
        };
        let html = saved_page(&page);
        assert!(html.contains("<title>&lt;script&gt;</title>"));
        assert!(html.contains("<p>hello</p>"));
    }
}
