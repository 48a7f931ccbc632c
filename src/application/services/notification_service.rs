//! Notification Service
//!
//! In-app notifications per user. Staff alerts go through Telegram instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Notification, NotificationRepository, NotificationStats, NotificationType, PENDING_LIMIT,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn list(
        &self,
        user_id: Uuid,
        read: Option<bool>,
        page: PageRequest,
    ) -> Result<NotificationPage, NotificationError>;

    async fn create(
        &self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: String,
        message: String,
        data: Option<serde_json::Value>,
    ) -> Result<Notification, NotificationError>;

    async fn pending(&self, user_id: Uuid) -> Result<Vec<Notification>, NotificationError>;

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, NotificationError>;

    async fn stats(&self, user_id: Uuid) -> Result<NotificationStats, NotificationError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationPageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Notification listings page by `limit` rather than `page_size`.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub pagination: NotificationPageMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Repository(e) => e,
        }
    }
}

pub struct NotificationServiceImpl<N: NotificationRepository> {
    repo: Arc<N>,
}

impl<N: NotificationRepository> NotificationServiceImpl<N> {
    pub fn new(repo: Arc<N>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<N: NotificationRepository + 'static> NotificationService for NotificationServiceImpl<N> {
    async fn list(
        &self,
        user_id: Uuid,
        read: Option<bool>,
        page: PageRequest,
    ) -> Result<NotificationPage, NotificationError> {
        let (items, total) = self.repo.list(user_id, read, page).await?;
        let total_pages = (total + page.page_size - 1) / page.page_size;
        Ok(NotificationPage {
            items,
            pagination: NotificationPageMeta {
                page: page.page,
                limit: page.page_size,
                total,
                total_pages,
            },
        })
    }

    async fn create(
        &self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: String,
        message: String,
        data: Option<serde_json::Value>,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification::new(user_id, notification_type, title, message, data);
        Ok(self.repo.create(&notification).await?)
    }

    async fn pending(&self, user_id: Uuid) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.repo.pending(user_id, PENDING_LIMIT).await?)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError> {
        self.repo
            .mark_read(id, user_id)
            .await?
            .ok_or(NotificationError::NotFound)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, NotificationError> {
        Ok(self.repo.mark_all_read(user_id).await?)
    }

    async fn stats(&self, user_id: Uuid) -> Result<NotificationStats, NotificationError> {
        let (total, unread) = self.repo.counts(user_id).await?;
        Ok(NotificationStats::from_counts(total, unread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockNotificationRepository;
    use mockall::predicate::{always, eq};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn list_reports_limit_and_page_count() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_list()
            .with(always(), eq(Some(false)), always())
            .returning(|_, _, _| Ok((vec![], 41)));

        let svc = NotificationServiceImpl::new(Arc::new(repo));
        let page = svc
            .list(Uuid::now_v7(), Some(false), PageRequest::new(Some(2), Some(20)))
            .await
            .unwrap();

        assert_eq!(
            page.pagination,
            NotificationPageMeta {
                page: 2,
                limit: 20,
                total: 41,
                total_pages: 3,
            }
        );
    }

    #[tokio::test]
    async fn pending_is_capped() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_pending()
            .with(always(), eq(PENDING_LIMIT))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let svc = NotificationServiceImpl::new(Arc::new(repo));
        svc.pending(Uuid::now_v7()).await.unwrap();
    }

    #[tokio::test]
    async fn marking_someone_elses_notification_is_not_found() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_mark_read().returning(|_, _| Ok(None));

        let svc = NotificationServiceImpl::new(Arc::new(repo));
        let err = svc.mark_read(Uuid::now_v7(), Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn stats_round_unread_share() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_counts().returning(|_| Ok((3, 2)));

        let svc = NotificationServiceImpl::new(Arc::new(repo));
        let stats = svc.stats(Uuid::now_v7()).await.unwrap();
        assert_eq!(stats.unread_percentage, 67);
        assert_eq!(stats.read, 1);
    }
}
