//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//!
//! Deleting an account releases the stock reserved by its active cart before
//! the cascade removes the cart rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{User, UserFilter, UserRepository, UserRole, UserStats, UserSummary};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: Option<String>,
    full_name: String,
    phone: Option<String>,
    role: String,
    is_guest: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            full_name: self.full_name,
            phone: self.phone,
            role: UserRole::from_str(&self.role),
            is_guest: self.is_guest,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserSummaryRow {
    #[sqlx(flatten)]
    user: UserRow,
    order_count: i64,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, phone, role, is_guest, created_at, updated_at";

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, phone, role, is_guest,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_guest)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User with this email already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_user())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET password_hash = $2, full_name = $3, phone = $4, role = $5, is_guest = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_guest)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(row.into_user())
    }

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<UserSummary>, i64), AppError> {
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let role = filter.role.map(|r| r.as_str());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL
                   OR email ILIKE '%' || $1 || '%'
                   OR full_name ILIKE '%' || $1 || '%'
                   OR phone LIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR role = $2)
            "#,
        )
        .bind(search)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, UserSummaryRow>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.full_name, u.phone, u.role, u.is_guest,
                   u.created_at, u.updated_at,
                   (SELECT COUNT(*) FROM orders o WHERE o.user_id = u.id) AS order_count
            FROM users u
            WHERE ($1::text IS NULL
                   OR u.email ILIKE '%' || $1 || '%'
                   OR u.full_name ILIKE '%' || $1 || '%'
                   OR u.phone LIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR u.role = $2)
            ORDER BY u.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(search)
        .bind(role)
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .into_iter()
            .map(|r| UserSummary {
                user: r.user.into_user(),
                order_count: r.order_count,
            })
            .collect();
        Ok((users, total))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let orders = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if orders > 0 {
            return Err(AppError::Conflict(format!(
                "User has {orders} orders and cannot be deleted"
            )));
        }

        sqlx::query(
            r#"
            UPDATE inventory i
            SET reserved = GREATEST(i.reserved - ci.quantity, 0), updated_at = NOW()
            FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE c.user_id = $1 AND c.status = 'ACTIVE' AND i.product_id = ci.product_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, AppError> {
        let (total, new_this_month, active) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE created_at >= date_trunc('month', $1::timestamptz)),
                   COUNT(*) FILTER (WHERE EXISTS (
                       SELECT 1 FROM orders o
                       WHERE o.user_id = users.id AND o.created_at >= $1 - INTERVAL '30 days'
                   ))
            FROM users
            WHERE NOT is_guest
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStats::new(total, new_this_month, active))
    }
}
