//! Promotion codes and their discount rules.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionType {
    Percentage,
    FixedAmount,
    FreeShipping,
    BuyXGetY,
}

impl PromotionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PERCENTAGE" => Some(Self::Percentage),
            "FIXED_AMOUNT" => Some(Self::FixedAmount),
            "FREE_SHIPPING" => Some(Self::FreeShipping),
            "BUY_X_GET_Y" => Some(Self::BuyXGetY),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "PERCENTAGE",
            Self::FixedAmount => "FIXED_AMOUNT",
            Self::FreeShipping => "FREE_SHIPPING",
            Self::BuyXGetY => "BUY_X_GET_Y",
        }
    }
}

/// Why a code cannot be applied, in the order the checks run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromotionRejection {
    #[error("Promotion code not found")]
    NotFound,
    #[error("Promotion is not active")]
    Inactive,
    #[error("Promotion has not started yet")]
    NotStarted,
    #[error("Promotion has expired")]
    Expired,
    #[error("Promotion usage limit reached")]
    UsageLimitReached,
    #[error("Order amount is below the minimum of {minimum} VND")]
    BelowMinimum { minimum: i64 },
}

/// Maps to the `promotions` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: Uuid,
    /// Always stored uppercase
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub promo_type: PromotionType,
    /// Percent for PERCENTAGE, VND for FIXED_AMOUNT
    pub value: i64,
    pub min_order_amount: Option<i64>,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Check every rule except existence.
    pub fn check_applicable(
        &self,
        order_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(), PromotionRejection> {
        if !self.is_active {
            return Err(PromotionRejection::Inactive);
        }
        if self.starts_at.is_some_and(|start| start > now) {
            return Err(PromotionRejection::NotStarted);
        }
        if self.expires_at.is_some_and(|end| end < now) {
            return Err(PromotionRejection::Expired);
        }
        if self
            .usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
        {
            return Err(PromotionRejection::UsageLimitReached);
        }
        if let Some(minimum) = self.min_order_amount {
            if order_amount < minimum {
                return Err(PromotionRejection::BelowMinimum { minimum });
            }
        }
        Ok(())
    }

    /// Discount for an order amount, never more than the amount itself.
    pub fn discount_for(&self, order_amount: i64) -> i64 {
        let raw = match self.promo_type {
            PromotionType::Percentage => {
                let wide = i128::from(order_amount) * i128::from(self.value) / 100;
                let pct = i64::try_from(wide).unwrap_or(i64::MAX);
                match self.max_discount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            PromotionType::FixedAmount => self.value,
            PromotionType::FreeShipping | PromotionType::BuyXGetY => 0,
        };
        raw.clamp(0, order_amount.max(0))
    }

    pub fn grants_free_shipping(&self) -> bool {
        self.promo_type == PromotionType::FreeShipping
    }
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PromotionStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub total_usage: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn list(
        &self,
        active: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Promotion>, i64), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Promotion>, AppError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Promotion>, AppError>;

    async fn code_exists(&self, code: &str) -> Result<bool, AppError>;

    async fn create(&self, promotion: &Promotion) -> Result<Promotion, AppError>;

    async fn update(&self, promotion: &Promotion) -> Result<Promotion, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<PromotionStats, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    fn promo(promo_type: PromotionType, value: i64) -> Promotion {
        let now = Utc::now();
        Promotion {
            id: Uuid::now_v7(),
            code: "SALE10".into(),
            name: "Sale".into(),
            description: None,
            promo_type,
            value,
            min_order_amount: None,
            max_discount: None,
            usage_limit: None,
            usage_count: 0,
            is_active: true,
            starts_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test_case(PromotionType::Percentage, 10, None, 1_000_000, 100_000)]
    #[test_case(PromotionType::Percentage, 50, Some(200_000), 1_000_000, 200_000; "percentage capped")]
    #[test_case(PromotionType::FixedAmount, 300_000, None, 1_000_000, 300_000)]
    #[test_case(PromotionType::FixedAmount, 300_000, None, 100_000, 100_000; "never above order")]
    #[test_case(PromotionType::FreeShipping, 0, None, 1_000_000, 0)]
    #[test_case(PromotionType::BuyXGetY, 1, None, 1_000_000, 0)]
    fn computes_discount(
        kind: PromotionType,
        value: i64,
        cap: Option<i64>,
        amount: i64,
        expected: i64,
    ) {
        let mut p = promo(kind, value);
        p.max_discount = cap;
        assert_eq!(p.discount_for(amount), expected);
    }

    #[test]
    fn percentage_of_huge_amount_does_not_overflow() {
        let amount = i64::MAX / 5;
        assert_eq!(promo(PromotionType::Percentage, 10).discount_for(amount), amount / 10);
        assert_eq!(promo(PromotionType::Percentage, 100).discount_for(i64::MAX), i64::MAX);
    }

    #[test]
    fn rejections_follow_check_order() {
        let now = Utc::now();

        let mut p = promo(PromotionType::Percentage, 10);
        p.is_active = false;
        p.expires_at = Some(now - Duration::days(1));
        assert_eq!(p.check_applicable(1, now), Err(PromotionRejection::Inactive));

        let mut p = promo(PromotionType::Percentage, 10);
        p.starts_at = Some(now + Duration::days(1));
        assert_eq!(p.check_applicable(1, now), Err(PromotionRejection::NotStarted));

        let mut p = promo(PromotionType::Percentage, 10);
        p.expires_at = Some(now - Duration::seconds(1));
        p.usage_limit = Some(0);
        assert_eq!(p.check_applicable(1, now), Err(PromotionRejection::Expired));

        let mut p = promo(PromotionType::Percentage, 10);
        p.usage_limit = Some(5);
        p.usage_count = 5;
        assert_eq!(
            p.check_applicable(1, now),
            Err(PromotionRejection::UsageLimitReached)
        );

        let mut p = promo(PromotionType::Percentage, 10);
        p.min_order_amount = Some(500_000);
        assert_eq!(
            p.check_applicable(499_999, now),
            Err(PromotionRejection::BelowMinimum { minimum: 500_000 })
        );
        assert_eq!(p.check_applicable(500_000, now), Ok(()));
    }

    #[test]
    fn codes_are_uppercased() {
        assert_eq!(Promotion::normalize_code("  sale10 "), "SALE10");
    }
}
