//! SQLite-backed user records.

use sqlx::{Row, SqlitePool};

use super::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user. A taken username is [`AuthError::UserExists`],
    /// including when a concurrent insert wins the UNIQUE constraint.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<User, AuthError> {
        let created_at = chrono::Utc::now().timestamp();

        let result =
            sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
                .bind(username)
                .bind(password_hash)
                .bind(created_at)
                .execute(&self.pool)
                .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::UserExists),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        let row =
            sqlx::query("SELECT id, username, password_hash, created_at FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn store() -> (TempDir, UserStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("users.sqlite"))
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        (tmp, UserStore::new(pool))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (_tmp, store) = store().await;
        let user = store.create("alice", "hash").await.unwrap();
        assert!(user.id > 0);

        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name, user);
        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(store.find_by_username("bob").await.unwrap().is_none());
        assert!(store.find_by_id(user.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let (_tmp, store) = store().await;
        store.create("alice", "hash").await.unwrap();
        let err = store.create("alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }
}
