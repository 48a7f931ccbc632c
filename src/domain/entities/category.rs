//! Product category entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Maps to the `categories` table. Categories nest through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        description: Option<String>,
        parent_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            slug: slug.into(),
            description,
            parent_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories ordered by name.
    async fn list(&self) -> Result<Vec<Category>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, AppError>;

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError>;

    async fn create(&self, category: &Category) -> Result<Category, AppError>;

    async fn update(&self, category: &Category) -> Result<Category, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    /// Number of non-deleted products in the category.
    async fn count_products(&self, id: Uuid) -> Result<i64, AppError>;

    async fn count_children(&self, id: Uuid) -> Result<i64, AppError>;
}
