use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{NewUser, User, UserChanges, UserField},
    repo::UserStore,
};

/// In-process user collection with the same semantics as the Postgres store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let record = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.write().await.insert(id, record);
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_field(&self, field: UserField, value: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| field.value_of(u) == value)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<u64> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.username = changes.username;
                user.email = changes.email;
                user.password_hash = changes.password_hash;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<u64> {
        Ok(self.users.write().await.remove(&id).map_or(0, |_| 1))
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
