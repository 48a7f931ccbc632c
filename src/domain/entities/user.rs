//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Account role matching the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer or staff account.
///
/// Maps to the `users` table:
/// - id: UUID PRIMARY KEY
/// - email: TEXT NOT NULL UNIQUE
/// - password_hash: TEXT NULL (guest accounts have none)
/// - full_name: TEXT NOT NULL
/// - phone: TEXT NULL
/// - role: TEXT NOT NULL DEFAULT 'USER'
/// - is_guest: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at / updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub full_name: String,

    pub phone: Option<String>,

    pub role: UserRole,

    /// Created implicitly by a guest checkout, upgraded on registration.
    pub is_guest: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a registered customer account.
    pub fn new_customer(
        email: impl Into<String>,
        password_hash: String,
        full_name: impl Into<String>,
        phone: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            password_hash: Some(password_hash),
            full_name: full_name.into(),
            phone,
            role: UserRole::User,
            is_guest: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a password-less account for a guest checkout.
    pub fn new_guest(
        email: impl Into<String>,
        full_name: impl Into<String>,
        phone: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            password_hash: None,
            full_name: full_name.into(),
            phone,
            role: UserRole::User,
            is_guest: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Admin listing filter. `search` matches email, name or phone.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub page: PageRequest,
}

/// A user together with how many orders they placed.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub order_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserStats {
    pub total_users: i64,
    pub new_users_this_month: i64,
    /// Users with an order in the last 30 days.
    pub active_users: i64,
    /// `active_users / total_users` in percent, two decimals.
    pub conversion_rate: f64,
}

impl UserStats {
    pub fn new(total_users: i64, new_users_this_month: i64, active_users: i64) -> Self {
        let conversion_rate = if total_users > 0 {
            (active_users as f64 * 10_000.0 / total_users as f64).round() / 100.0
        } else {
            0.0
        };
        Self {
            total_users,
            new_users_this_month,
            active_users,
            conversion_rate,
        }
    }
}

/// Repository trait for User data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Emails are compared case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn create(&self, user: &User) -> Result<User, AppError>;

    async fn update(&self, user: &User) -> Result<User, AppError>;

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<UserSummary>, i64), AppError>;

    /// Delete the account and release its cart reservations. Fails with
    /// `Conflict` while orders still reference the user.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    /// Counts relative to `now`: the calendar month for new users, the last
    /// 30 days for active ones.
    async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, AppError>;
}
