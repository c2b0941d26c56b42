/// User accounts.
///
/// Besides profile data a user row holds the digests of two single-use tokens:
/// the email verification token (cleared when consumed) and the password reset
/// token (cleared when consumed, and only honoured before its expiry). Deleting
/// a user cascades to every contact, lead and task it owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::query::{Filter, ListQuery, Listing, Page, PageParams, QueryError, SortPolicy};

const COLUMNS: &str = "id, name, email, hashed_password, role, is_verified, created_at";

/// Admin user listing. Sort fields outside the allow-list are rejected.
pub static USER_LISTING: Listing = Listing {
    table: "users",
    columns: COLUMNS,
    sortable: &["id", "name", "email", "created_at", "role"],
    searchable: &["name", "email"],
};

/// Account role. Stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user; never includes credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile::from(&user)
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    /// SHA-256 digest of the emailed verification token
    pub verification_digest: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.hashed_password.is_none()
            && self.role.is_none()
    }
}

/// Listing filters for the admin user index.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a user. The email must already be normalized.
    ///
    /// # Errors
    ///
    /// A duplicate email surfaces as a unique violation on `users_email_key`.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, hashed_password, role, verification_token_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.email)
        .bind(data.hashed_password)
        .bind(data.role)
        .bind(data.verification_digest)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Applies the fields present in `data`. Returns `None` if no such user.
    pub async fn update(
        pool: &PgPool,
        id: i64,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        if data.is_empty() {
            return Self::find_by_id(pool, id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(name) = data.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(email) = data.email {
                set.push("email = ").push_bind_unseparated(email);
            }
            if let Some(hashed_password) = data.hashed_password {
                set.push("hashed_password = ").push_bind_unseparated(hashed_password);
            }
            if let Some(role) = data.role {
                set.push("role = ").push_bind_unseparated(role);
            }
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Deletes the user and, by cascade, everything it owns.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks the owner of `digest` verified and clears the token in one statement.
    pub async fn consume_verification_token(
        pool: &PgPool,
        digest: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_verified = TRUE, verification_token_hash = NULL \
             WHERE verification_token_hash = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(digest)
        .fetch_optional(pool)
        .await
    }

    /// Stores a reset token digest, replacing any outstanding one.
    pub async fn set_password_reset_token(
        pool: &PgPool,
        id: i64,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_reset_token_hash = $2, password_reset_expires_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Swaps in `hashed_password` if `digest` names an unexpired reset token,
    /// clearing the token so it cannot be replayed.
    pub async fn consume_password_reset_token(
        pool: &PgPool,
        digest: &str,
        hashed_password: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET hashed_password = $2, \
                 password_reset_token_hash = NULL, password_reset_expires_at = NULL \
             WHERE password_reset_token_hash = $1 AND password_reset_expires_at > NOW() \
             RETURNING {COLUMNS}"
        ))
        .bind(digest)
        .bind(hashed_password)
        .fetch_optional(pool)
        .await
    }

    /// Admin listing over all users.
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        params: &PageParams,
    ) -> Result<Page<Self>, QueryError> {
        ListQuery::new(&USER_LISTING, params, SortPolicy::Strict)?
            .filter_opt(
                filter
                    .role
                    .map(|role| Filter::Text("role::text", role.as_str().to_string())),
            )
            .fetch(pool)
            .await
    }
}
