//! User Repository

use sqlx::{Row, SqlitePool};

use super::{bounded, from_millis, millis};
use crate::domain::{Role, User};
use crate::error::{ApiError, Result};

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        bounded(async {
            let result = sqlx::query(
                "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(millis(&user.created_at))
            .bind(millis(&user.updated_at))
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(ApiError::conflict("Username or email already in use"))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        bounded(async {
            let row = sqlx::query("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_user).transpose()
        })
        .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        bounded(async {
            let row = sqlx::query("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_user).transpose()
        })
        .await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        bounded(async {
            let row = sqlx::query("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_user).transpose()
        })
        .await
    }

    /// Update username and/or email. Uniqueness collisions surface as
    /// `Conflict` via the table constraints.
    pub async fn update_profile(&self, id: &str, username: &str, email: &str) -> Result<()> {
        bounded(async {
            let result = sqlx::query(
                "UPDATE users SET username = ?, email = ?, updated_at = ? WHERE id = ?",
            )
            .bind(username)
            .bind(email)
            .bind(millis(&chrono::Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(ApiError::conflict("Username or email already in use"))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        bounded(async {
            sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
                .bind(password_hash)
                .bind(millis(&chrono::Utc::now()))
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Direct administrative removal; cascades to the user's events and
    /// registrations. Not exposed through the API.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        bounded(async {
            let result = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| ApiError::internal(format!("unknown role in store: {}", role_str)))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
