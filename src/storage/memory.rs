//! In-memory storage with optional JSON snapshot persistence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::storage::{AuthSession, Group, GroupMembership, Page, Store, StoreError, User};

/// On-disk form of every table.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    pages: Vec<Page>,
    users: Vec<User>,
    sessions: Vec<AuthSession>,
    groups: Vec<Group>,
    memberships: Vec<GroupMembership>,
}

/// A thread-safe store backed by concurrent maps.
///
/// Unique columns (page route, username, one session per user) are enforced
/// through index maps. Index entries are always locked before the table they
/// point into, and no map reference is held across another map's lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: DashMap<String, Page>,
    /// route -> page uuid
    routes: DashMap<String, String>,
    users: DashMap<String, User>,
    /// username -> user uuid
    usernames: DashMap<String, String>,
    sessions: DashMap<String, AuthSession>,
    /// user uuid -> session id
    user_sessions: DashMap<String, String>,
    groups: DashMap<String, Group>,
    memberships: DashMap<String, Vec<GroupMembership>>,
    persistence_path: Option<PathBuf>,
    closed: AtomicBool,
}

fn conflict(entity: &'static str, key: &str) -> StoreError {
    StoreError::Conflict { entity, key: key.to_string() }
}

fn not_found(entity: &'static str, key: &str) -> StoreError {
    StoreError::NotFound { entity, key: key.to_string() }
}

impl MemoryStore {
    /// Create an empty store that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store, loading the snapshot at `path` if it exists.
    pub fn open(path: Option<&Path>) -> Result<Self, StoreError> {
        let store = Self {
            persistence_path: path.map(Path::to_path_buf),
            ..Self::default()
        };

        if let Some(path) = path {
            if path.exists() {
                let reader = BufReader::new(File::open(path)?);
                let snapshot: Snapshot = serde_json::from_reader(reader)?;
                store.restore(snapshot)?;
                tracing::info!(
                    path = %path.display(),
                    pages = store.pages.len(),
                    users = store.users.len(),
                    sessions = store.sessions.len(),
                    "Loaded storage snapshot"
                );
            }
        }
        Ok(store)
    }

    fn restore(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        for page in snapshot.pages {
            self.insert_page(page)?;
        }
        for user in snapshot.users {
            self.insert_user(user)?;
        }
        for session in snapshot.sessions {
            self.insert_session(session)?;
        }
        for group in snapshot.groups {
            self.insert_group(group)?;
        }
        for membership in snapshot.memberships {
            self.add_group_member(membership)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pages: self.pages.iter().map(|r| r.value().clone()).collect(),
            users: self.users.iter().map(|r| r.value().clone()).collect(),
            sessions: self.sessions.iter().map(|r| r.value().clone()).collect(),
            groups: self.groups.iter().map(|r| r.value().clone()).collect(),
            memberships: self
                .memberships
                .iter()
                .flat_map(|r| r.value().clone())
                .collect(),
        }
    }

    /// Write every table to the snapshot file, if one is configured.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let snapshot = self.snapshot();
        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), "Storage snapshot written");
        Ok(())
    }

    /// Drop every row. Used by development mode before seeding.
    pub fn wipe(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        tracing::debug!("Wiping all storage tables");
        self.routes.clear();
        self.pages.clear();
        self.usernames.clear();
        self.users.clear();
        self.user_sessions.clear();
        self.sessions.clear();
        self.memberships.clear();
        self.groups.clear();
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Store for MemoryStore {
    fn pages(&self) -> Result<Vec<Page>, StoreError> {
        self.ensure_open()?;
        let mut pages: Vec<Page> = self.pages.iter().map(|r| r.value().clone()).collect();
        pages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.route.cmp(&b.route)));
        Ok(pages)
    }

    fn page_routes(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let mut routes: Vec<String> = self.routes.iter().map(|r| r.key().clone()).collect();
        routes.sort();
        Ok(routes)
    }

    fn page_by_route(&self, route: &str) -> Result<Option<Page>, StoreError> {
        self.ensure_open()?;
        let uuid = self.routes.get(route).map(|r| r.value().clone());
        Ok(uuid.and_then(|uuid| self.pages.get(&uuid).map(|p| p.value().clone())))
    }

    fn page_by_uuid(&self, uuid: &str) -> Result<Option<Page>, StoreError> {
        self.ensure_open()?;
        Ok(self.pages.get(uuid).map(|p| p.value().clone()))
    }

    fn insert_page(&self, page: Page) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.pages.contains_key(&page.uuid) {
            return Err(conflict("page", &page.uuid));
        }
        match self.routes.entry(page.route.clone()) {
            Entry::Occupied(_) => Err(conflict("page route", &page.route)),
            Entry::Vacant(slot) => {
                slot.insert(page.uuid.clone());
                self.pages.insert(page.uuid.clone(), page);
                Ok(())
            }
        }
    }

    fn update_page(&self, page: Page) -> Result<(), StoreError> {
        self.ensure_open()?;
        let old_route = self
            .pages
            .get(&page.uuid)
            .map(|p| p.route.clone())
            .ok_or_else(|| not_found("page", &page.uuid))?;

        if old_route != page.route {
            match self.routes.entry(page.route.clone()) {
                Entry::Occupied(_) => return Err(conflict("page route", &page.route)),
                Entry::Vacant(slot) => {
                    slot.insert(page.uuid.clone());
                }
            }
            self.routes.remove_if(&old_route, |_, owner| *owner == page.uuid);
        }
        self.pages.insert(page.uuid.clone(), page);
        Ok(())
    }

    fn delete_page(&self, uuid: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        match self.pages.remove(uuid) {
            Some((_, page)) => {
                self.routes.remove_if(&page.route, |_, owner| *owner == page.uuid);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        self.ensure_open()?;
        let mut users: Vec<User> = self.users.iter().map(|r| r.value().clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    fn user_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        Ok(self.users.get(uuid).map(|u| u.value().clone()))
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        let uuid = self.usernames.get(username).map(|r| r.value().clone());
        Ok(uuid.and_then(|uuid| self.users.get(&uuid).map(|u| u.value().clone())))
    }

    fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.users.contains_key(&user.uuid) {
            return Err(conflict("user", &user.uuid));
        }
        match self.usernames.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(conflict("username", &user.username)),
            Entry::Vacant(slot) => {
                slot.insert(user.uuid.clone());
                self.users.insert(user.uuid.clone(), user);
                Ok(())
            }
        }
    }

    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        match self.users.remove(uuid) {
            Some((_, user)) => {
                self.usernames.remove_if(&user.username, |_, owner| *owner == user.uuid);
                for mut members in self.memberships.iter_mut() {
                    members.retain(|m| m.user_uuid != user.uuid);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn sessions(&self) -> Result<Vec<AuthSession>, StoreError> {
        self.ensure_open()?;
        Ok(self.sessions.iter().map(|r| r.value().clone()).collect())
    }

    fn session_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, StoreError> {
        self.ensure_open()?;
        Ok(self.sessions.get(session_id).map(|s| s.value().clone()))
    }

    fn session_by_user(&self, user_uuid: &str) -> Result<Option<AuthSession>, StoreError> {
        self.ensure_open()?;
        let id = self.user_sessions.get(user_uuid).map(|r| r.value().clone());
        Ok(id.and_then(|id| self.sessions.get(&id).map(|s| s.value().clone())))
    }

    fn insert_session(&self, session: AuthSession) -> Result<(), StoreError> {
        self.ensure_open()?;
        match self.user_sessions.entry(session.user_uuid.clone()) {
            Entry::Occupied(_) => Err(conflict("session for user", &session.user_uuid)),
            Entry::Vacant(slot) => {
                slot.insert(session.session_id.clone());
                self.sessions.insert(session.session_id.clone(), session);
                Ok(())
            }
        }
    }

    fn replace_user_session(&self, session: AuthSession) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut current = self
            .user_sessions
            .get_mut(&session.user_uuid)
            .ok_or_else(|| not_found("session for user", &session.user_uuid))?;
        let previous = std::mem::replace(current.value_mut(), session.session_id.clone());
        self.sessions.remove(&previous);
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn touch_session(&self, session_id: &str, at: u64) -> Result<bool, StoreError> {
        self.ensure_open()?;
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.last_active_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_session(&self, session_id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                self.user_sessions
                    .remove_if(&session.user_uuid, |_, id| id == session_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn groups(&self) -> Result<Vec<Group>, StoreError> {
        self.ensure_open()?;
        let mut groups: Vec<Group> = self.groups.iter().map(|r| r.value().clone()).collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    fn group_members(&self, group_uuid: &str) -> Result<Vec<GroupMembership>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .memberships
            .get(group_uuid)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    fn insert_group(&self, group: Group) -> Result<(), StoreError> {
        self.ensure_open()?;
        match self.groups.entry(group.uuid.clone()) {
            Entry::Occupied(_) => Err(conflict("group", &group.uuid)),
            Entry::Vacant(slot) => {
                slot.insert(group);
                Ok(())
            }
        }
    }

    fn add_group_member(&self, membership: GroupMembership) -> Result<(), StoreError> {
        self.ensure_open()?;
        if !self.groups.contains_key(&membership.group_uuid) {
            return Err(not_found("group", &membership.group_uuid));
        }
        let mut members = self
            .memberships
            .entry(membership.group_uuid.clone())
            .or_default();
        if !members.iter().any(|m| m.user_uuid == membership.user_uuid) {
            members.push(membership);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Closing storage");
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::UserRole;

    fn page(uuid: &str, route: &str) -> Page {
        Page {
            uuid: uuid.into(),
            author_uuid: "author".into(),
            title: format!("Page {}", uuid),
            route: route.into(),
            content: "<p>hi</p>".into(),
            role_protected: false,
            created_at: 1,
        }
    }

    fn user(uuid: &str, username: &str) -> User {
        User {
            uuid: uuid.into(),
            username: username.into(),
            auth_hash: "hash".into(),
            first_name: "First".into(),
            last_name: "Last".into(),
            email: "someone@example.com".into(),
            role: UserRole::Regular,
            created_at: 1,
        }
    }

    fn session(id: &str, user_uuid: &str, created_at: u64) -> AuthSession {
        AuthSession {
            session_id: id.into(),
            user_uuid: user_uuid.into(),
            created_at,
            last_active_at: created_at,
        }
    }

    #[test]
    fn page_routes_are_unique() {
        let store = MemoryStore::in_memory();
        store.insert_page(page("p1", "/about")).unwrap();

        let err = store.insert_page(page("p2", "/about")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "page route", .. }));
        assert_eq!(store.page_routes().unwrap(), vec!["/about".to_string()]);
    }

    #[test]
    fn moving_a_page_frees_its_old_route() {
        let store = MemoryStore::in_memory();
        store.insert_page(page("p1", "/old")).unwrap();
        store.update_page(page("p1", "/new")).unwrap();

        assert!(store.page_by_route("/old").unwrap().is_none());
        assert_eq!(store.page_by_route("/new").unwrap().unwrap().uuid, "p1");
        store.insert_page(page("p2", "/old")).unwrap();
    }

    #[test]
    fn one_session_row_per_user() {
        let store = MemoryStore::in_memory();
        store.insert_session(session("s1", "u1", 10)).unwrap();
        assert!(store.insert_session(session("s2", "u1", 20)).is_err());

        store.replace_user_session(session("s2", "u1", 20)).unwrap();
        assert!(store.session_by_id("s1").unwrap().is_none());
        assert_eq!(store.session_by_user("u1").unwrap().unwrap().session_id, "s2");
        assert_eq!(store.sessions().unwrap().len(), 1);
    }

    #[test]
    fn deleting_a_session_clears_the_user_index() {
        let store = MemoryStore::in_memory();
        store.insert_session(session("s1", "u1", 10)).unwrap();
        assert!(store.delete_session("s1").unwrap());
        assert!(!store.delete_session("s1").unwrap());
        assert!(store.session_by_user("u1").unwrap().is_none());
        store.insert_session(session("s2", "u1", 20)).unwrap();
    }

    #[test]
    fn touch_reports_missing_sessions() {
        let store = MemoryStore::in_memory();
        store.insert_session(session("s1", "u1", 10)).unwrap();
        assert!(store.touch_session("s1", 99).unwrap());
        assert_eq!(store.session_by_id("s1").unwrap().unwrap().last_active_at, 99);
        assert!(!store.touch_session("missing", 99).unwrap());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = MemoryStore::in_memory();
        store.close().unwrap();
        assert!(matches!(store.pages(), Err(StoreError::Closed)));
        assert!(matches!(store.session_by_id("s1"), Err(StoreError::Closed)));
        // Closing twice is harmless.
        store.close().unwrap();
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("content.json");

        let store = MemoryStore::open(Some(path.as_path())).unwrap();
        store.insert_page(page("p1", "/about")).unwrap();
        store.insert_user(user("u1", "jdoe")).unwrap();
        store.insert_session(session("s1", "u1", 10)).unwrap();
        store
            .insert_group(Group { uuid: "g1".into(), title: "Editors".into(), created_at: 1 })
            .unwrap();
        store
            .add_group_member(GroupMembership {
                group_uuid: "g1".into(),
                user_uuid: "u1".into(),
                created_at: 1,
            })
            .unwrap();
        store.close().unwrap();

        let loaded = MemoryStore::open(Some(path.as_path())).unwrap();
        assert_eq!(loaded.page_by_route("/about").unwrap().unwrap().uuid, "p1");
        assert_eq!(loaded.user_by_username("jdoe").unwrap().unwrap().uuid, "u1");
        assert_eq!(loaded.session_by_user("u1").unwrap().unwrap().session_id, "s1");
        assert_eq!(loaded.group_members("g1").unwrap().len(), 1);
    }

    #[test]
    fn deleting_a_user_drops_memberships() {
        let store = MemoryStore::in_memory();
        store.insert_user(user("u1", "jdoe")).unwrap();
        store
            .insert_group(Group { uuid: "g1".into(), title: "Editors".into(), created_at: 1 })
            .unwrap();
        store
            .add_group_member(GroupMembership {
                group_uuid: "g1".into(),
                user_uuid: "u1".into(),
                created_at: 1,
            })
            .unwrap();

        assert!(store.delete_user("u1").unwrap());
        assert!(store.user_by_username("jdoe").unwrap().is_none());
        assert!(store.group_members("g1").unwrap().is_empty());
    }
}
