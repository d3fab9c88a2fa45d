pub mod auth;
pub mod handlers;
pub mod views;

use axum::http::Method;
use axum::routing::{get, post, MethodRouter};

use crate::http::server::AppState;
use self::auth::*;
use self::handlers::*;

/// The fixed administrative routes. Everything under `/admin` requires a
/// session; login, logout and setup do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminRoute {
    Login,
    Logout,
    Setup,
    Dashboard,
    Status,
    Users,
    UsersNew,
    UsersDelete,
    Pages,
    PagesNew,
    PagesEdit,
    PagesDelete,
    Groups,
}

impl AdminRoute {
    pub const ALL: [AdminRoute; 13] = [
        AdminRoute::Login,
        AdminRoute::Logout,
        AdminRoute::Setup,
        AdminRoute::Dashboard,
        AdminRoute::Status,
        AdminRoute::Users,
        AdminRoute::UsersNew,
        AdminRoute::UsersDelete,
        AdminRoute::Pages,
        AdminRoute::PagesNew,
        AdminRoute::PagesEdit,
        AdminRoute::PagesDelete,
        AdminRoute::Groups,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            AdminRoute::Login => "/login",
            AdminRoute::Logout => "/logout",
            AdminRoute::Setup => "/setup",
            AdminRoute::Dashboard => "/admin",
            AdminRoute::Status => "/admin/status",
            AdminRoute::Users => "/admin/users",
            AdminRoute::UsersNew => "/admin/users/new",
            AdminRoute::UsersDelete => "/admin/users/delete",
            AdminRoute::Pages => "/admin/pages",
            AdminRoute::PagesNew => "/admin/pages/new",
            AdminRoute::PagesEdit => "/admin/pages/edit/{uuid}",
            AdminRoute::PagesDelete => "/admin/pages/delete",
            AdminRoute::Groups => "/admin/groups",
        }
    }

    pub fn methods(self) -> &'static [Method] {
        const GET: &[Method] = &[Method::GET, Method::HEAD];
        const GET_POST: &[Method] = &[Method::GET, Method::HEAD, Method::POST];
        const POST: &[Method] = &[Method::POST];
        match self {
            AdminRoute::Login
            | AdminRoute::Logout
            | AdminRoute::Setup
            | AdminRoute::UsersNew
            | AdminRoute::PagesNew
            | AdminRoute::PagesEdit => GET_POST,
            AdminRoute::UsersDelete | AdminRoute::PagesDelete => POST,
            AdminRoute::Dashboard
            | AdminRoute::Status
            | AdminRoute::Users
            | AdminRoute::Pages
            | AdminRoute::Groups => GET,
        }
    }

    pub(crate) fn method_router(self) -> MethodRouter<AppState> {
        match self {
            AdminRoute::Login => get(login_page).post(login_submit),
            AdminRoute::Logout => get(logout).post(logout),
            AdminRoute::Setup => get(setup_page).post(setup_submit),
            AdminRoute::Dashboard => get(dashboard),
            AdminRoute::Status => get(get_status),
            AdminRoute::Users => get(list_users),
            AdminRoute::UsersNew => get(new_user_page).post(create_user),
            AdminRoute::UsersDelete => post(delete_users),
            AdminRoute::Pages => get(list_pages),
            AdminRoute::PagesNew => get(new_page_form).post(create_page),
            AdminRoute::PagesEdit => get(edit_page_form).post(update_page),
            AdminRoute::PagesDelete => post(delete_pages),
            AdminRoute::Groups => get(list_groups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn patterns_are_distinct() {
        let patterns: HashSet<_> = AdminRoute::ALL.iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns.len(), AdminRoute::ALL.len());
    }

    #[test]
    fn only_entry_points_sit_outside_admin_prefix() {
        for route in AdminRoute::ALL {
            let public = matches!(route, AdminRoute::Login | AdminRoute::Logout | AdminRoute::Setup);
            assert_eq!(!route.pattern().starts_with("/admin"), public, "{route:?}");
        }
    }
}
