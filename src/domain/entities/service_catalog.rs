//! Repair and installation services offered by the shop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

/// Default duration of a service visit, in minutes.
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

/// Maps to `service_types`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceType {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    #[default]
    Fixed,
    Range,
    Negotiable,
    Contact,
}

impl PriceType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FIXED" => Some(Self::Fixed),
            "RANGE" => Some(Self::Range),
            "NEGOTIABLE" => Some(Self::Negotiable),
            "CONTACT" => Some(Self::Contact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "FIXED",
            Self::Range => "RANGE",
            Self::Negotiable => "NEGOTIABLE",
            Self::Contact => "CONTACT",
        }
    }
}

/// Prices of a service after applying its price type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePricing {
    pub base_price: i64,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

impl ServicePricing {
    /// FIXED keeps the base price, RANGE bases on the minimum, the rest are quoted on request.
    pub fn normalize(
        price_type: PriceType,
        base_price: Option<i64>,
        min_price: Option<i64>,
        max_price: Option<i64>,
    ) -> Self {
        match price_type {
            PriceType::Fixed => Self {
                base_price: base_price.unwrap_or(0),
                min_price: None,
                max_price: None,
            },
            PriceType::Range => Self {
                base_price: min_price.unwrap_or(0),
                min_price,
                max_price,
            },
            PriceType::Negotiable | PriceType::Contact => Self {
                base_price: 0,
                min_price: None,
                max_price: None,
            },
        }
    }
}

/// Maps to `services`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub type_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_type: PriceType,
    pub base_price: i64,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub duration_minutes: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn apply_pricing(&mut self, pricing: ServicePricing) {
        self.base_price = pricing.base_price;
        self.min_price = pricing.min_price;
        self.max_price = pricing.max_price;
    }
}

/// Optional add-on priced on top of a service. Maps to `service_items`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceItem {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maps to `technicians`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub skills: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceStats {
    pub total_services: i64,
    pub active_services: i64,
    pub total_bookings: i64,
    pub bookings_by_status: Vec<super::order::StatusCount>,
    /// Sum of booked item prices
    pub item_revenue: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceTypeRepository: Send + Sync {
    /// Ordered by `sort_order`.
    async fn list(&self) -> Result<Vec<ServiceType>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceType>, AppError>;

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError>;

    async fn max_sort_order(&self) -> Result<i32, AppError>;

    async fn create(&self, service_type: &ServiceType) -> Result<ServiceType, AppError>;

    async fn update(&self, service_type: &ServiceType) -> Result<ServiceType, AppError>;

    async fn count_services(&self, id: Uuid) -> Result<i64, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn list(
        &self,
        type_id: Option<Uuid>,
        is_active: Option<bool>,
        page: PageRequest,
    ) -> Result<(Vec<Service>, i64), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Service>, AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Service>, AppError>;

    async fn slug_exists(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, AppError>;

    async fn create(&self, service: &Service) -> Result<Service, AppError>;

    async fn update(&self, service: &Service) -> Result<Service, AppError>;

    async fn count_bookings(&self, id: Uuid) -> Result<i64, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn items(&self, service_id: Uuid) -> Result<Vec<ServiceItem>, AppError>;

    async fn find_item(&self, item_id: Uuid) -> Result<Option<ServiceItem>, AppError>;

    async fn create_item(&self, item: &ServiceItem) -> Result<ServiceItem, AppError>;

    async fn update_item(&self, item: &ServiceItem) -> Result<ServiceItem, AppError>;

    async fn count_item_bookings(&self, item_id: Uuid) -> Result<i64, AppError>;

    async fn delete_item(&self, item_id: Uuid) -> Result<(), AppError>;

    async fn stats(&self) -> Result<ServiceStats, AppError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TechnicianRepository: Send + Sync {
    async fn list(&self, active_only: bool) -> Result<Vec<Technician>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Technician>, AppError>;

    async fn create(&self, technician: &Technician) -> Result<Technician, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PriceType::Fixed, Some(500_000), Some(1), Some(2), 500_000, None, None)]
    #[test_case(PriceType::Range, Some(9), Some(200_000), Some(800_000), 200_000, Some(200_000), Some(800_000))]
    #[test_case(PriceType::Negotiable, Some(9), Some(1), Some(2), 0, None, None)]
    #[test_case(PriceType::Contact, None, None, None, 0, None, None)]
    fn normalizes_prices_by_type(
        price_type: PriceType,
        base: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
        expected_base: i64,
        expected_min: Option<i64>,
        expected_max: Option<i64>,
    ) {
        let pricing = ServicePricing::normalize(price_type, base, min, max);
        assert_eq!(
            pricing,
            ServicePricing {
                base_price: expected_base,
                min_price: expected_min,
                max_price: expected_max,
            }
        );
    }
}
