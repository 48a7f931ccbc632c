//! Service Type Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ServiceType, ServiceTypeRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ServiceTypeRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    icon: Option<String>,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ServiceTypeRow> for ServiceType {
    fn from(row: ServiceTypeRow) -> Self {
        ServiceType {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            icon: row.icon,
            sort_order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: &str = "id, name, slug, description, icon, sort_order, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgServiceTypeRepository {
    pool: PgPool,
}

impl PgServiceTypeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceTypeRepository for PgServiceTypeRepository {
    async fn list(&self) -> Result<Vec<ServiceType>, AppError> {
        let rows = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            "SELECT {COLUMNS} FROM service_types ORDER BY sort_order ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ServiceType::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceType>, AppError> {
        let row = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            "SELECT {COLUMNS} FROM service_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ServiceType::from))
    }

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM service_types WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn max_sort_order(&self) -> Result<i32, AppError> {
        let max = sqlx::query_scalar::<_, i32>("SELECT COALESCE(MAX(sort_order), 0) FROM service_types")
            .fetch_one(&self.pool)
            .await?;

        Ok(max)
    }

    async fn create(&self, service_type: &ServiceType) -> Result<ServiceType, AppError> {
        let row = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            r#"
            INSERT INTO service_types (id, name, slug, description, icon, sort_order, is_active,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(service_type.id)
        .bind(&service_type.name)
        .bind(&service_type.slug)
        .bind(&service_type.description)
        .bind(&service_type.icon)
        .bind(service_type.sort_order)
        .bind(service_type.is_active)
        .bind(service_type.created_at)
        .bind(service_type.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Service type slug already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into())
    }

    async fn update(&self, service_type: &ServiceType) -> Result<ServiceType, AppError> {
        let row = sqlx::query_as::<_, ServiceTypeRow>(&format!(
            r#"
            UPDATE service_types
            SET name = $2, slug = $3, description = $4, icon = $5, sort_order = $6,
                is_active = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(service_type.id)
        .bind(&service_type.name)
        .bind(&service_type.slug)
        .bind(&service_type.description)
        .bind(&service_type.icon)
        .bind(service_type.sort_order)
        .bind(service_type.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Service type not found".to_string()))?;

        Ok(row.into())
    }

    async fn count_services(&self, id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services WHERE type_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM service_types WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Service type not found".to_string()));
        }
        Ok(())
    }
}
