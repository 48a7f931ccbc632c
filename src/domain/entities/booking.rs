//! Service bookings, their items and payments.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "ASSIGNED" => Some(Self::Assigned),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "RESCHEDULED" => Some(Self::Rescheduled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Rescheduled => "RESCHEDULED",
        }
    }

    pub fn allowed_transitions(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[Confirmed, Assigned, Cancelled, Rescheduled],
            Confirmed => &[Assigned, InProgress, Cancelled, Rescheduled],
            Assigned => &[InProgress, Cancelled, Rescheduled],
            InProgress => &[Completed, Cancelled],
            Rescheduled => &[Confirmed, Assigned, InProgress, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Bookings in these states no longer hold a technician's slot.
    pub fn frees_slot(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

/// Maps to `service_bookings`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub service_id: Uuid,
    /// `None` for guest bookings
    pub user_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub status: BookingStatus,
    pub scheduled_date: NaiveDate,
    /// `HH:MM`, one of the booking slots
    pub scheduled_time: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub estimated_costs: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maps to `service_booking_items`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingItem {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub service_item_id: Uuid,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServicePaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl ServicePaymentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }
}

/// Maps to `service_payments`. Provider is free text, `COD` by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePayment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: String,
    pub amount: i64,
    pub status: ServicePaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list(
        &self,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, i64), AppError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, AppError>;

    async fn items(&self, booking_id: Uuid) -> Result<Vec<BookingItem>, AppError>;

    /// Whether the technician already holds a live booking at that slot.
    async fn slot_taken(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError>;

    /// Insert the booking and its items in one transaction.
    async fn create(&self, booking: &Booking, items: &[BookingItem]) -> Result<Booking, AppError>;

    async fn update(&self, booking: &Booking) -> Result<Booking, AppError>;

    /// Delete payments, items and the booking in one transaction.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn create_payment(&self, payment: &ServicePayment) -> Result<ServicePayment, AppError>;

    async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: ServicePaymentStatus,
    ) -> Result<Option<ServicePayment>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(BookingStatus::Pending, BookingStatus::Assigned, true)]
    #[test_case(BookingStatus::Pending, BookingStatus::InProgress, false)]
    #[test_case(BookingStatus::Confirmed, BookingStatus::InProgress, true)]
    #[test_case(BookingStatus::Assigned, BookingStatus::Confirmed, false)]
    #[test_case(BookingStatus::InProgress, BookingStatus::Completed, true)]
    #[test_case(BookingStatus::InProgress, BookingStatus::Rescheduled, false)]
    #[test_case(BookingStatus::Rescheduled, BookingStatus::Confirmed, true)]
    #[test_case(BookingStatus::Completed, BookingStatus::Cancelled, false)]
    #[test_case(BookingStatus::Cancelled, BookingStatus::Pending, false)]
    fn validates_transitions(from: BookingStatus, to: BookingStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn finished_bookings_free_their_slot() {
        assert!(BookingStatus::Cancelled.frees_slot());
        assert!(BookingStatus::Completed.frees_slot());
        assert!(!BookingStatus::Rescheduled.frees_slot());
    }
}
