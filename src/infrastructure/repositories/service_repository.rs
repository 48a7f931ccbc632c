//! Service Repository Implementation
//!
//! Covers services and their add-on items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{PriceType, Service, ServiceItem, ServiceRepository, ServiceStats, StatusCount};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: Uuid,
    type_id: Option<Uuid>,
    name: String,
    slug: String,
    description: Option<String>,
    price_type: String,
    base_price: i64,
    min_price: Option<i64>,
    max_price: Option<i64>,
    duration_minutes: i32,
    images: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceRow {
    fn into_service(self) -> Service {
        Service {
            id: self.id,
            type_id: self.type_id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            price_type: PriceType::from_str(&self.price_type).unwrap_or_default(),
            base_price: self.base_price,
            min_price: self.min_price,
            max_price: self.max_price,
            duration_minutes: self.duration_minutes,
            images: self.images,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ServiceItemRow {
    id: Uuid,
    service_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ServiceItemRow> for ServiceItem {
    fn from(row: ServiceItemRow) -> Self {
        ServiceItem {
            id: row.id,
            service_id: row.service_id,
            name: row.name,
            description: row.description,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SERVICE_COLUMNS: &str = "id, type_id, name, slug, description, price_type, base_price, \
     min_price, max_price, duration_minutes, images, is_active, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, service_id, name, description, price, is_active, created_at, updated_at";

fn map_unique(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Service slug already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgServiceRepository {
    pool: PgPool,
}

impl PgServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceRepository for PgServiceRepository {
    async fn list(
        &self,
        type_id: Option<Uuid>,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Service>, i64), AppError> {
        let filter = "($1::uuid IS NULL OR type_id = $1) AND ($2::boolean IS NULL OR is_active = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM services WHERE {filter}"))
            .bind(type_id)
            .bind(is_active)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM services
            WHERE {filter}
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(type_id)
        .bind(is_active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(ServiceRow::into_service).collect(), total))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServiceRow::into_service))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Service>, AppError> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServiceRow::into_service))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM services WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, service: &Service) -> Result<Service, AppError> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            INSERT INTO services (id, type_id, name, slug, description, price_type, base_price,
                                  min_price, max_price, duration_minutes, images, is_active,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(service.id)
        .bind(service.type_id)
        .bind(&service.name)
        .bind(&service.slug)
        .bind(&service.description)
        .bind(service.price_type.as_str())
        .bind(service.base_price)
        .bind(service.min_price)
        .bind(service.max_price)
        .bind(service.duration_minutes)
        .bind(&service.images)
        .bind(service.is_active)
        .bind(service.created_at)
        .bind(service.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)?;

        Ok(row.into_service())
    }

    async fn update(&self, service: &Service) -> Result<Service, AppError> {
        let row = sqlx::query_as::<_, ServiceRow>(&format!(
            r#"
            UPDATE services
            SET type_id = $2, name = $3, slug = $4, description = $5, price_type = $6,
                base_price = $7, min_price = $8, max_price = $9, duration_minutes = $10,
                images = $11, is_active = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(service.id)
        .bind(service.type_id)
        .bind(&service.name)
        .bind(&service.slug)
        .bind(&service.description)
        .bind(service.price_type.as_str())
        .bind(service.base_price)
        .bind(service.min_price)
        .bind(service.max_price)
        .bind(service.duration_minutes)
        .bind(&service.images)
        .bind(service.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

        Ok(row.into_service())
    }

    async fn count_bookings(&self, id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_bookings WHERE service_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Service not found".to_string()));
        }
        Ok(())
    }

    async fn items(&self, service_id: Uuid) -> Result<Vec<ServiceItem>, AppError> {
        let rows = sqlx::query_as::<_, ServiceItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM service_items WHERE service_id = $1 ORDER BY created_at ASC"
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ServiceItem::from).collect())
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<ServiceItem>, AppError> {
        let row = sqlx::query_as::<_, ServiceItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM service_items WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServiceItem::from))
    }

    async fn create_item(&self, item: &ServiceItem) -> Result<ServiceItem, AppError> {
        let row = sqlx::query_as::<_, ServiceItemRow>(&format!(
            r#"
            INSERT INTO service_items (id, service_id, name, description, price, is_active,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id)
        .bind(item.service_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_item(&self, item: &ServiceItem) -> Result<ServiceItem, AppError> {
        let row = sqlx::query_as::<_, ServiceItemRow>(&format!(
            r#"
            UPDATE service_items
            SET name = $2, description = $3, price = $4, is_active = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Service item not found".to_string()))?;

        Ok(row.into())
    }

    async fn count_item_bookings(&self, item_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM service_booking_items WHERE service_item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn delete_item(&self, item_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM service_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Service item not found".to_string()));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<ServiceStats, AppError> {
        let (total_services, active_services) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM services",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM service_bookings GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let item_revenue = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(price * quantity), 0)::BIGINT FROM service_booking_items",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ServiceStats {
            total_services,
            active_services,
            total_bookings: by_status.iter().map(|(_, count)| count).sum(),
            bookings_by_status: by_status
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            item_revenue,
        })
    }
}
