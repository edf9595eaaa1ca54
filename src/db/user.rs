use sqlx::sqlite::SqlitePool;

use crate::jwt::Identity;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub full_name: String,
    pub nick_name: String,
    pub email: String,
    pub location: String,
    pub password_hash: String,
    /// Durable refresh credential (NULL when the user has no persistent login)
    pub refresh_token: Option<String>,
    pub avatar: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl User {
    /// Identity claims to sign into a session token.
    pub fn identity(&self) -> Identity {
        Identity {
            full_name: self.full_name.clone(),
            nick_name: self.nick_name.clone(),
            email: self.email.clone(),
            id: self.uuid.clone(),
        }
    }
}

/// Fields for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub nick_name: String,
    pub email: String,
    pub location: String,
    pub password_hash: String,
}

/// Partial profile update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub nick_name: Option<String>,
    pub location: Option<String>,
    pub avatar: Option<String>,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user and return the stored record.
    pub async fn create(&self, new_user: &NewUser) -> Result<User, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        let result = sqlx::query(
            "INSERT INTO users (uuid, full_name, nick_name, email, location, password_hash) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(&new_user.full_name)
        .bind(&new_user.nick_name)
        .bind(&new_user.email)
        .bind(&new_user.location)
        .bind(&new_user.password_hash)
        .execute(&self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, full_name, nick_name, email, location, password_hash, refresh_token, avatar, last_login, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user by public UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, full_name, nick_name, email, location, password_hash, refresh_token, avatar, last_login, created_at FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, full_name, nick_name, email, location, password_hash, refresh_token, avatar, last_login, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user by nickname (case-insensitive).
    pub async fn get_by_nick_name(&self, nick_name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, uuid, full_name, nick_name, email, location, password_hash, refresh_token, avatar, last_login, created_at FROM users WHERE nick_name = ?",
        )
        .bind(nick_name)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn is_nick_name_available(&self, nick_name: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE nick_name = ?")
            .bind(nick_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    pub async fn is_email_available(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }

    /// Store or clear the durable refresh credential. Returns true if a user matched.
    pub async fn set_refresh_token(
        &self,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET refresh_token = ? WHERE email = ?")
            .bind(refresh_token)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set last_login to now. Returns true if a user matched.
    pub async fn touch_last_login(&self, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login = datetime('now') WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a partial profile update.
    pub async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                full_name = COALESCE(?, full_name),
                nick_name = COALESCE(?, nick_name),
                location = COALESCE(?, location),
                avatar = COALESCE(?, avatar),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(update.full_name.as_deref())
        .bind(update.nick_name.as_deref())
        .bind(update.location.as_deref())
        .bind(update.avatar.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
