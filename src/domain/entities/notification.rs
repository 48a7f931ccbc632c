//! In-app notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Most unread notifications returned by `pending`.
pub const PENDING_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Order,
    Payment,
    Promotion,
    System,
    Welcome,
}

impl NotificationType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ORDER" => Some(Self::Order),
            "PAYMENT" => Some(Self::Payment),
            "PROMOTION" => Some(Self::Promotion),
            "SYSTEM" => Some(Self::System),
            "WELCOME" => Some(Self::Welcome),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::Payment => "PAYMENT",
            Self::Promotion => "PROMOTION",
            Self::System => "SYSTEM",
            Self::Welcome => "WELCOME",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            data,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub read: i64,
    pub unread_percentage: i64,
}

impl NotificationStats {
    pub fn from_counts(total: i64, unread: i64) -> Self {
        let unread_percentage = if total > 0 {
            ((unread as f64 / total as f64) * 100.0).round() as i64
        } else {
            0
        };
        Self {
            total,
            unread,
            read: total - unread,
            unread_percentage,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Newest first, optionally filtered by read state.
    async fn list(
        &self,
        user_id: Uuid,
        read: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, i64), AppError>;

    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    async fn pending(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>, AppError>;

    /// Returns `None` when the notification does not belong to the user.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// `(total, unread)`
    async fn counts(&self, user_id: Uuid) -> Result<(i64, i64), AppError>;
}
