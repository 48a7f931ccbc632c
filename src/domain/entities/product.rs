//! Product entity, listing filter and repository trait.
//!
//! Maps to the `products` table. Prices are VND.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Short descriptions are cut from the full description at this many characters.
pub const SHORT_DESCRIPTION_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: i64,
    pub original_price: Option<i64>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub meta_title: Option<String>,
    /// Soft delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Purchasable: active and not soft-deleted.
    pub fn is_available(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// First 200 characters of the description, on a char boundary.
    pub fn derive_short_description(description: &str) -> String {
        description.chars().take(SHORT_DESCRIPTION_LEN).collect()
    }
}

/// Sortable product columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortField {
    #[default]
    CreatedAt,
    Name,
    Price,
}

impl ProductSortField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Name => "name",
            Self::Price => "price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Storefront listing filter. Only available products are ever listed.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub featured: Option<bool>,
    pub sort_by: ProductSortField,
    pub order: SortDirection,
    pub page: PageRequest,
}

impl ProductFilter {
    /// Stable key fragment for caching a listing.
    pub fn cache_fragment(&self) -> String {
        format!(
            "q={}|cat={}|min={}|max={}|feat={}|sort={}:{}|p={}:{}",
            self.q.as_deref().unwrap_or(""),
            self.category_id.map(|c| c.to_string()).unwrap_or_default(),
            self.min_price.map(|v| v.to_string()).unwrap_or_default(),
            self.max_price.map(|v| v.to_string()).unwrap_or_default(),
            self.featured.map(|v| v.to_string()).unwrap_or_default(),
            self.sort_by.column(),
            self.order.as_sql(),
            self.page.page,
            self.page.page_size,
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Matching products for the page and the total match count.
    async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, AppError>;

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError>;

    async fn sku_exists(&self, sku: &str) -> Result<bool, AppError>;

    /// Insert the product together with its inventory row.
    async fn create(&self, product: &Product, initial_stock: i32) -> Result<Product, AppError>;

    async fn update(&self, product: &Product) -> Result<Product, AppError>;

    async fn count_order_items(&self, id: Uuid) -> Result<i64, AppError>;

    /// Remove the inventory row and the product in one transaction.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_description_respects_char_boundaries() {
        let long = "â".repeat(250);
        let short = Product::derive_short_description(&long);
        assert_eq!(short.chars().count(), SHORT_DESCRIPTION_LEN);
    }

    #[test]
    fn cache_fragment_changes_with_filter() {
        let a = ProductFilter::default();
        let b = ProductFilter {
            q: Some("loa".into()),
            ..Default::default()
        };
        assert_ne!(a.cache_fragment(), b.cache_fragment());
    }
}
