//! Technician Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Technician, TechnicianRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct TechnicianRow {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    skills: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TechnicianRow> for Technician {
    fn from(row: TechnicianRow) -> Self {
        Technician {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            skills: row.skills,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgTechnicianRepository {
    pool: PgPool,
}

impl PgTechnicianRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TechnicianRepository for PgTechnicianRepository {
    async fn list(&self, active_only: bool) -> Result<Vec<Technician>, AppError> {
        let rows = sqlx::query_as::<_, TechnicianRow>(
            r#"
            SELECT id, name, phone, email, skills, is_active, created_at, updated_at
            FROM technicians
            WHERE ($1 = FALSE OR is_active)
            ORDER BY name ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Technician::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Technician>, AppError> {
        let row = sqlx::query_as::<_, TechnicianRow>(
            r#"
            SELECT id, name, phone, email, skills, is_active, created_at, updated_at
            FROM technicians
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Technician::from))
    }

    async fn create(&self, technician: &Technician) -> Result<Technician, AppError> {
        let row = sqlx::query_as::<_, TechnicianRow>(
            r#"
            INSERT INTO technicians (id, name, phone, email, skills, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, phone, email, skills, is_active, created_at, updated_at
            "#,
        )
        .bind(technician.id)
        .bind(&technician.name)
        .bind(&technician.phone)
        .bind(&technician.email)
        .bind(&technician.skills)
        .bind(technician.is_active)
        .bind(technician.created_at)
        .bind(technician.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
