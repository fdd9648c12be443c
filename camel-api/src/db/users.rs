//! Account persistence

use camel_common::{Error, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{format_timestamp, parse_timestamp};
use crate::models::{User, UserCredentials};

/// Insert a new account
///
/// Returns [`Error::Conflict`] when the username or email is already taken.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
    password_salt: &str,
) -> Result<User> {
    let created_at = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, password_salt, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(password_salt)
    .bind(format_timestamp(created_at))
    .execute(pool)
    .await
    .map_err(Error::Database);

    let result = match result {
        Ok(result) => result,
        Err(e) if e.is_unique_violation() => {
            return Err(Error::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        Err(e) => return Err(e),
    };

    Ok(User {
        id: result.last_insert_rowid(),
        username: username.to_string(),
        email: email.to_string(),
        created_at,
    })
}

/// Look up login credentials by username
pub async fn find_credentials_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserCredentials>> {
    let row = sqlx::query(
        "SELECT id, username, password_hash, password_salt FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(|row| -> Result<UserCredentials> {
        Ok(UserCredentials {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
        })
    })
    .transpose()
}

/// Fetch the public view of an account
pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let created_at: String = row.try_get("created_at")?;
            Ok(Some(User {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_db() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = camel_common::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let (_dir, pool) = setup_db().await;

        let user = create_user(&pool, "nomad", "nomad@example.com", "h", "s")
            .await
            .unwrap();
        assert!(user.id > 0);

        let fetched = get_user(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "nomad");
        assert_eq!(fetched.email, "nomad@example.com");
        assert_eq!(fetched.created_at, user.created_at);

        let creds = find_credentials_by_username(&pool, "nomad")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.id, user.id);
        assert_eq!(creds.password_hash, "h");
        assert_eq!(creds.password_salt, "s");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (_dir, pool) = setup_db().await;
        create_user(&pool, "nomad", "a@example.com", "h", "s")
            .await
            .unwrap();

        let err = create_user(&pool, "nomad", "b@example.com", "h", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (_dir, pool) = setup_db().await;
        create_user(&pool, "first", "same@example.com", "h", "s")
            .await
            .unwrap();

        let err = create_user(&pool, "second", "same@example.com", "h", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_user() {
        let (_dir, pool) = setup_db().await;
        assert!(get_user(&pool, 999).await.unwrap().is_none());
        assert!(find_credentials_by_username(&pool, "ghost")
            .await
            .unwrap()
            .is_none());
    }
}
