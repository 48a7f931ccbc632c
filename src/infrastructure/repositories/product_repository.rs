//! Product Repository Implementation
//!
//! Listing filters are bound as nullable parameters; the sort column comes
//! from a closed enum and is the only part formatted into the SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Product, ProductFilter, ProductRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    short_description: Option<String>,
    price: i64,
    original_price: Option<i64>,
    images: Vec<String>,
    is_active: bool,
    is_featured: bool,
    meta_title: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id,
            category_id: self.category_id,
            name: self.name,
            slug: self.slug,
            sku: self.sku,
            description: self.description,
            short_description: self.short_description,
            price: self.price,
            original_price: self.original_price,
            images: self.images,
            is_active: self.is_active,
            is_featured: self.is_featured,
            meta_title: self.meta_title,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, category_id, name, slug, sku, description, short_description, \
     price, original_price, images, is_active, is_featured, meta_title, deleted_at, created_at, updated_at";

const LISTING_WHERE: &str = r#"
    WHERE is_active = TRUE AND deleted_at IS NULL
      AND ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR description ILIKE '%' || $1 || '%')
      AND ($2::uuid IS NULL OR category_id = $2)
      AND ($3::bigint IS NULL OR price >= $3)
      AND ($4::bigint IS NULL OR price <= $4)
      AND ($5::boolean IS NULL OR is_featured = $5)
"#;

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Product slug or SKU already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), AppError> {
        let q = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM products {LISTING_WHERE}"))
            .bind(q)
            .bind(filter.category_id)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.featured)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {LISTING_WHERE} ORDER BY {} {}, id ASC LIMIT $6 OFFSET $7",
            filter.sort_by.column(),
            filter.order.as_sql(),
        ))
        .bind(q)
        .bind(filter.category_id)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.featured)
        .bind(filter.page.limit())
        .bind(filter.page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(|r| r.into_product()).collect(), total))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_product()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND deleted_at IS NULL"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_product()))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn sku_exists(&self, sku: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE sku = $1)")
            .bind(sku)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn create(&self, product: &Product, initial_stock: i32) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (id, category_id, name, slug, sku, description, short_description,
                                  price, original_price, images, is_active, is_featured, meta_title,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.price)
        .bind(product.original_price)
        .bind(&product.images)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(&product.meta_title)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique)?;

        sqlx::query("INSERT INTO inventory (product_id, stock, reserved, updated_at) VALUES ($1, $2, 0, NOW())")
            .bind(product.id)
            .bind(initial_stock)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_product())
    }

    async fn update(&self, product: &Product) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET category_id = $2, name = $3, slug = $4, sku = $5, description = $6,
                short_description = $7, price = $8, original_price = $9, images = $10,
                is_active = $11, is_featured = $12, meta_title = $13, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(product.price)
        .bind(product.original_price)
        .bind(&product.images)
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(&product.meta_title)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        Ok(row.into_product())
    }

    async fn count_order_items(&self, id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inventory WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }
}
