//! Known test data for development mode.

use uuid::Uuid;

use crate::sessions::auth::hash_password;
use crate::storage::{unix_now, Group, GroupMembership, Page, Store, StoreError, User, UserRole};

pub const DEV_USERNAME: &str = "jdoe";
pub const DEV_PASSWORD: &str = "iamjohndoe";

/// Fill the store with a root user, a group and a few pages.
pub fn seed_test_data(store: &dyn Store) -> Result<(), StoreError> {
    let now = unix_now();
    let root = User {
        uuid: Uuid::new_v4().to_string(),
        username: DEV_USERNAME.to_string(),
        auth_hash: hash_password(DEV_PASSWORD),
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        email: "person@place.com".to_string(),
        role: UserRole::Root,
        created_at: now,
    };
    store.insert_user(root.clone())?;

    let editors = Group {
        uuid: Uuid::new_v4().to_string(),
        title: "Editors".to_string(),
        created_at: now,
    };
    store.insert_group(editors.clone())?;
    store.add_group_member(GroupMembership {
        group_uuid: editors.uuid,
        user_uuid: root.uuid.clone(),
        created_at: now,
    })?;

    let pages = [
        ("Home", "/", "<h1>Welcome</h1>", false),
        ("About", "/about", "<h2>About this site</h2>", false),
        ("Secret", "/secret", "<h2>Members only</h2>", true),
    ];
    for (title, route, content, role_protected) in pages {
        store.insert_page(Page {
            uuid: Uuid::new_v4().to_string(),
            author_uuid: root.uuid.clone(),
            title: title.to_string(),
            route: route.to_string(),
            content: content.to_string(),
            role_protected,
            created_at: now,
        })?;
    }

    tracing::info!(username = DEV_USERNAME, "Seeded development data");
    Ok(())
}
