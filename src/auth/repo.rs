use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Account record. Derived secrets and outstanding token material never
/// serialize into responses.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verify_email_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub verify_email_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_password_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, role, is_verified, \
     verify_email_token_hash, verify_email_expires_at, \
     reset_password_token_hash, reset_password_expires_at, created_at";

// Uniqueness of email and single-statement token overwrites are delegated to
// Postgres (unique index, per-row UPDATE atomicity); there is no in-process
// locking here.
impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (first_name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrites any outstanding verification token.
    pub async fn set_verify_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET verify_email_token_hash = $2, verify_email_expires_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_verify_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET verify_email_token_hash = NULL, verify_email_expires_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Looks up the account holding an unexpired verification token. Expiry
    /// is checked lazily here, not swept proactively.
    pub async fn find_by_verify_token(
        db: &PgPool,
        token_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE verify_email_token_hash = $1 AND verify_email_expires_at > now()"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Flips the account to verified and consumes the token in one statement.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET is_verified = TRUE, \
             verify_email_token_hash = NULL, verify_email_expires_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_password_token_hash = $2, reset_password_expires_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET reset_password_token_hash = NULL, reset_password_expires_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_by_reset_token(
        db: &PgPool,
        token_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_password_token_hash = $1 AND reset_password_expires_at > now()"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Sets the new password hash and consumes the reset token atomically.
    pub async fn reset_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, \
             reset_password_token_hash = NULL, reset_password_expires_at = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Applies only the provided profile fields.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
             first_name = COALESCE($2, first_name), \
             last_name = COALESCE($3, last_name), \
             email = COALESCE($4, email) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }
}

/// Postgres raises 23505 when the email unique index rejects an insert or
/// update racing past the handler-level existence check.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$fake".into(),
            role: Role::User,
            is_verified: false,
            verify_email_token_hash: Some("deadbeef".into()),
            verify_email_expires_at: Some(OffsetDateTime::now_utc()),
            reset_password_token_hash: None,
            reset_password_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn serialization_never_exposes_secrets() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("verifyEmailTokenHash"));
        assert!(json.contains("\"firstName\":\"A\""));
        assert!(json.contains("\"isVerified\":false"));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn unique_violation_detection_ignores_other_errors() {
        let err = anyhow::anyhow!("something else");
        assert!(!is_unique_violation(&err));
        let err: anyhow::Error = sqlx::Error::RowNotFound.into();
        assert!(!is_unique_violation(&err));
    }
}
