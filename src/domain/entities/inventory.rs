//! Inventory levels, stock movements and adjustment rules.
//!
//! `stock` is the physical count, `reserved` the part held by active carts.
//! Neither may go below zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Maps to the `inventory` table (one row per product).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryLevel {
    pub product_id: Uuid,
    pub stock: i32,
    pub reserved: i32,
    pub low_stock_threshold: i32,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLevel {
    pub fn empty(product_id: Uuid) -> Self {
        Self {
            product_id,
            stock: 0,
            reserved: 0,
            low_stock_threshold: 0,
            updated_at: Utc::now(),
        }
    }

    /// Units that can still be put into carts.
    pub fn available(&self) -> i32 {
        (self.stock - self.reserved).max(0)
    }

    /// A threshold of zero disables low-stock alerts.
    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold > 0 && self.stock <= self.low_stock_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Reserved,
    Unreserved,
}

impl MovementType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(Self::In),
            "OUT" => Some(Self::Out),
            "RESERVED" => Some(Self::Reserved),
            "UNRESERVED" => Some(Self::Unreserved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Reserved => "RESERVED",
            Self::Unreserved => "UNRESERVED",
        }
    }
}

/// Maps to the `inventory_movements` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Admin adjustment request. Absolute values win over deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryAdjustment {
    pub stock: Option<i32>,
    pub stock_delta: Option<i32>,
    pub reserved: Option<i32>,
    pub reserved_delta: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
}

impl InventoryAdjustment {
    /// Compute the resulting level, rejecting negative stock or reservations.
    pub fn apply(&self, current: &InventoryLevel) -> Result<InventoryLevel, AppError> {
        let stock = match (self.stock, self.stock_delta) {
            (Some(absolute), _) => absolute,
            (None, Some(delta)) => current.stock + delta,
            (None, None) => current.stock,
        };
        let reserved = match (self.reserved, self.reserved_delta) {
            (Some(absolute), _) => absolute,
            (None, Some(delta)) => current.reserved + delta,
            (None, None) => current.reserved,
        };
        let low_stock_threshold = self
            .low_stock_threshold
            .unwrap_or(current.low_stock_threshold);

        if stock < 0 {
            return Err(AppError::BadRequest("Stock cannot be negative".into()));
        }
        if reserved < 0 {
            return Err(AppError::BadRequest("Reserved quantity cannot be negative".into()));
        }
        if low_stock_threshold < 0 {
            return Err(AppError::BadRequest("Low stock threshold cannot be negative".into()));
        }

        Ok(InventoryLevel {
            product_id: current.product_id,
            stock,
            reserved,
            low_stock_threshold,
            updated_at: Utc::now(),
        })
    }

    /// Movement rows describing the change from `before` to `after`.
    pub fn movements(
        &self,
        before: &InventoryLevel,
        after: &InventoryLevel,
    ) -> Vec<InventoryMovement> {
        let mut movements = Vec::new();
        let now = Utc::now();

        let stock_change = after.stock - before.stock;
        if stock_change != 0 {
            movements.push(InventoryMovement {
                id: Uuid::now_v7(),
                product_id: after.product_id,
                movement_type: if stock_change > 0 {
                    MovementType::In
                } else {
                    MovementType::Out
                },
                quantity: stock_change.abs(),
                previous_stock: before.stock,
                new_stock: after.stock,
                reason: self.reason.clone(),
                reference_id: self.reference_id.clone(),
                created_at: now,
            });
        }

        let reserved_change = after.reserved - before.reserved;
        if reserved_change != 0 {
            movements.push(InventoryMovement {
                id: Uuid::now_v7(),
                product_id: after.product_id,
                movement_type: if reserved_change > 0 {
                    MovementType::Reserved
                } else {
                    MovementType::Unreserved
                },
                quantity: reserved_change.abs(),
                previous_stock: after.stock,
                new_stock: after.stock,
                reason: self.reason.clone(),
                reference_id: self.reference_id.clone(),
                created_at: now,
            });
        }

        movements
    }
}

/// Outcome of an adjustment, as persisted.
#[derive(Debug, Clone)]
pub struct AdjustmentResult {
    pub before: InventoryLevel,
    pub after: InventoryLevel,
    pub movements: Vec<InventoryMovement>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn list(
        &self,
        low_stock_only: bool,
        page: PageRequest,
    ) -> Result<(Vec<InventoryLevel>, i64), AppError>;

    async fn find(&self, product_id: Uuid) -> Result<Option<InventoryLevel>, AppError>;

    /// Lock the row (creating it when missing), apply the adjustment and
    /// record movements in one transaction.
    async fn adjust(
        &self,
        product_id: Uuid,
        adjustment: &InventoryAdjustment,
    ) -> Result<AdjustmentResult, AppError>;

    async fn movements(
        &self,
        product_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InventoryMovement>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn level(stock: i32, reserved: i32, threshold: i32) -> InventoryLevel {
        InventoryLevel {
            product_id: Uuid::nil(),
            stock,
            reserved,
            low_stock_threshold: threshold,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn available_never_negative() {
        assert_eq!(level(5, 2, 0).available(), 3);
        assert_eq!(level(1, 4, 0).available(), 0);
    }

    #[test]
    fn low_stock_needs_positive_threshold() {
        assert!(level(3, 0, 3).is_low_stock());
        assert!(!level(4, 0, 3).is_low_stock());
        assert!(!level(0, 0, 0).is_low_stock());
    }

    #[test]
    fn absolute_values_win_over_deltas() {
        let adjustment = InventoryAdjustment {
            stock: Some(10),
            stock_delta: Some(-100),
            reserved_delta: Some(2),
            ..Default::default()
        };
        let after = adjustment.apply(&level(4, 1, 0)).unwrap();
        assert_eq!((after.stock, after.reserved), (10, 3));
    }

    #[test]
    fn rejects_negative_results() {
        let adjustment = InventoryAdjustment {
            stock_delta: Some(-5),
            ..Default::default()
        };
        assert!(adjustment.apply(&level(4, 0, 0)).is_err());

        let adjustment = InventoryAdjustment {
            reserved_delta: Some(-1),
            ..Default::default()
        };
        assert!(adjustment.apply(&level(4, 0, 0)).is_err());
    }

    #[test]
    fn records_one_movement_per_changed_quantity() {
        let adjustment = InventoryAdjustment {
            stock_delta: Some(-2),
            reserved_delta: Some(1),
            reason: Some("recount".into()),
            ..Default::default()
        };
        let before = level(10, 0, 0);
        let after = adjustment.apply(&before).unwrap();
        let movements = adjustment.movements(&before, &after);

        let kinds: Vec<_> = movements.iter().map(|m| (m.movement_type, m.quantity)).collect();
        assert_eq!(kinds, vec![(MovementType::Out, 2), (MovementType::Reserved, 1)]);
        assert_eq!(movements[0].previous_stock, 10);
        assert_eq!(movements[0].new_stock, 8);
    }

    #[test]
    fn threshold_only_change_records_nothing() {
        let adjustment = InventoryAdjustment {
            low_stock_threshold: Some(5),
            ..Default::default()
        };
        let before = level(10, 0, 0);
        let after = adjustment.apply(&before).unwrap();
        assert!(adjustment.movements(&before, &after).is_empty());
        assert_eq!(after.low_stock_threshold, 5);
    }
}
