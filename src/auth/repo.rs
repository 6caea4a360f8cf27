use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("username already taken")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence for user records. Implementations enforce unique usernames and emails.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<User, InsertError>;
    /// Writes mutable fields back. `is_confirmed` is never cleared once set.
    /// Fails when no row has `user.id`.
    async fn update(&self, user: &User) -> anyhow::Result<()>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, is_confirmed";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, InsertError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return match db.constraint() {
                            Some("users_username_key") => InsertError::UsernameTaken,
                            _ => InsertError::EmailTaken,
                        };
                    }
                }
                InsertError::Other(anyhow::Error::new(e).context("insert user"))
            })
    }

    async fn update(&self, user: &User) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET username = $2,
                   email = $3,
                   password_hash = $4,
                   is_confirmed = is_confirmed OR $5
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_confirmed)
        .execute(&self.db)
        .await
        .context("update user")?;
        if result.rows_affected() != 1 {
            anyhow::bail!("update user {}: no such user", user.id);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(())
    }
}

/// Process-local store, used by the test suites.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    async fn find_where(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.read().await.values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_where(|u| u.username == username).await)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_where(|u| u.email == email).await)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, InsertError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(InsertError::UsernameTaken);
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(InsertError::EmailTaken);
        }
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
            is_confirmed: false,
        };
        users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let Some(row) = users.get_mut(&user.id) else {
            anyhow::bail!("update user {}: no such user", user.id);
        };
        row.username = user.username.clone();
        row.email = user.email.clone();
        row.password_hash = user.password_hash.clone();
        row.is_confirmed |= user.is_confirmed;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.users.write().await.remove(&id);
        Ok(())
    }
}
