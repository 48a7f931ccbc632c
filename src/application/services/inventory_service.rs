//! Inventory Service
//!
//! Stock levels, manual adjustments and the movement ledger. Cart
//! reservations and checkout deductions happen inside the cart and order
//! repositories' own transactions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    InventoryAdjustment, InventoryLevel, InventoryMovement, InventoryRepository,
    ProductRepository,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};

const DEFAULT_MOVEMENT_LIMIT: i64 = 50;
const MAX_MOVEMENT_LIMIT: i64 = 200;

#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn list(
        &self,
        low_stock_only: bool,
        page: PageRequest,
    ) -> Result<Paginated<InventoryView>, InventoryError>;

    async fn get(&self, product_id: Uuid) -> Result<InventoryView, InventoryError>;

    async fn adjust(
        &self,
        product_id: Uuid,
        adjustment: InventoryAdjustment,
    ) -> Result<AdjustmentView, InventoryError>;

    async fn movements(
        &self,
        product_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<InventoryMovement>, InventoryError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InventoryView {
    pub product_id: Uuid,
    pub stock: i32,
    pub reserved: i32,
    pub available: i32,
    pub low_stock_threshold: i32,
    pub is_low_stock: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryLevel> for InventoryView {
    fn from(level: InventoryLevel) -> Self {
        Self {
            available: level.available(),
            is_low_stock: level.is_low_stock(),
            product_id: level.product_id,
            stock: level.stock,
            reserved: level.reserved,
            low_stock_threshold: level.low_stock_threshold,
            updated_at: level.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentView {
    pub inventory: InventoryView,
    pub movements: Vec<InventoryMovement>,
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Adjustment changes nothing")]
    EmptyAdjustment,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound => AppError::NotFound(err.to_string()),
            InventoryError::EmptyAdjustment => AppError::BadRequest(err.to_string()),
            InventoryError::Repository(e) => e,
        }
    }
}

pub struct InventoryServiceImpl<I, P>
where
    I: InventoryRepository,
    P: ProductRepository,
{
    inventory_repo: Arc<I>,
    product_repo: Arc<P>,
}

impl<I, P> InventoryServiceImpl<I, P>
where
    I: InventoryRepository,
    P: ProductRepository,
{
    pub fn new(inventory_repo: Arc<I>, product_repo: Arc<P>) -> Self {
        Self {
            inventory_repo,
            product_repo,
        }
    }

    async fn ensure_product(&self, product_id: Uuid) -> Result<(), InventoryError> {
        self.product_repo
            .find_by_id(product_id)
            .await?
            .filter(|p| p.deleted_at.is_none())
            .ok_or(InventoryError::ProductNotFound)?;
        Ok(())
    }
}

#[async_trait]
impl<I, P> InventoryService for InventoryServiceImpl<I, P>
where
    I: InventoryRepository + 'static,
    P: ProductRepository + 'static,
{
    async fn list(
        &self,
        low_stock_only: bool,
        page: PageRequest,
    ) -> Result<Paginated<InventoryView>, InventoryError> {
        let (levels, total) = self.inventory_repo.list(low_stock_only, page).await?;
        Ok(Paginated::new(levels, page, total).map(InventoryView::from))
    }

    async fn get(&self, product_id: Uuid) -> Result<InventoryView, InventoryError> {
        self.ensure_product(product_id).await?;
        let level = self
            .inventory_repo
            .find(product_id)
            .await?
            .unwrap_or_else(|| InventoryLevel::empty(product_id));
        Ok(level.into())
    }

    async fn adjust(
        &self,
        product_id: Uuid,
        adjustment: InventoryAdjustment,
    ) -> Result<AdjustmentView, InventoryError> {
        let unchanged = InventoryAdjustment {
            reason: adjustment.reason.clone(),
            reference_id: adjustment.reference_id.clone(),
            ..Default::default()
        };
        if adjustment == unchanged {
            return Err(InventoryError::EmptyAdjustment);
        }

        self.ensure_product(product_id).await?;
        let result = self.inventory_repo.adjust(product_id, &adjustment).await?;

        info!(
            product_id = %product_id,
            stock_before = result.before.stock,
            stock_after = result.after.stock,
            reserved_after = result.after.reserved,
            movements = result.movements.len(),
            "Inventory adjusted"
        );
        if result.after.is_low_stock() {
            warn!(
                product_id = %product_id,
                stock = result.after.stock,
                threshold = result.after.low_stock_threshold,
                "Low stock"
            );
        }

        Ok(AdjustmentView {
            inventory: result.after.into(),
            movements: result.movements,
        })
    }

    async fn movements(
        &self,
        product_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<InventoryMovement>, InventoryError> {
        self.ensure_product(product_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
            .clamp(1, MAX_MOVEMENT_LIMIT);
        Ok(self.inventory_repo.movements(product_id, limit).await?)
    }
}
