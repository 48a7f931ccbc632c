//! Notification Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Notification, NotificationRepository, NotificationType};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    data: Option<serde_json::Value>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            notification_type: NotificationType::from_str(&self.notification_type)
                .unwrap_or(NotificationType::System),
            title: self.title,
            message: self.message,
            data: self.data,
            read_at: self.read_at,
            created_at: self.created_at,
        }
    }
}

const COLUMNS: &str = "id, user_id, notification_type, title, message, data, read_at, created_at";

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn list(
        &self,
        user_id: Uuid,
        read: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, i64), AppError> {
        let filter = "user_id = $1 AND ($2::boolean IS NULL OR (read_at IS NOT NULL) = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM notifications WHERE {filter}"
        ))
        .bind(user_id)
        .bind(read)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM notifications
            WHERE {filter}
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(read)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(NotificationRow::into_notification).collect(), total))
    }

    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, notification_type, title, message, data,
                                       read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_notification())
    }

    async fn pending(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND read_at IS NULL
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NotificationRow::into_notification).collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(NotificationRow::into_notification))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn counts(&self, user_id: Uuid) -> Result<(i64, i64), AppError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE read_at IS NULL)
            FROM notifications
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
