use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{NewUser, User, UserChanges, UserField};
use crate::error::AppError;

/// Persistence seam for user records. Every failure is a backend failure;
/// "absent" is expressed through `Option` and counts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> anyhow::Result<Uuid>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_field(&self, field: UserField, value: &str) -> anyhow::Result<Option<User>>;
    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<u64>;
    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<u64>;
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;
}

/// Parses a client supplied identifier. Malformed input is an invalid argument,
/// never a lookup miss.
pub fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidArgument("invalid user id".into()))
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_field(&self, field: UserField, value: &str) -> anyhow::Result<Option<User>> {
        // Column names come from a closed enum, never from input.
        let sql = format!(
            "SELECT id, username, email, password_hash, created_at \
             FROM users WHERE {} = $1 ORDER BY created_at LIMIT 1",
            field.column()
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}
