//! Orders, order items and the order status machine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Completed,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Completed,
        Self::Cancelled,
        Self::Returned,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PROCESSING" => Some(Self::Processing),
            "SHIPPED" => Some(Self::Shipped),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "RETURNED" => Some(Self::Returned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        }
    }

    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Processing, Cancelled],
            Confirmed => &[Processing, Shipped, Completed, Cancelled],
            Processing => &[Shipped, Completed, Cancelled],
            Shipped => &[Completed, Returned, Cancelled],
            Completed => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Entering this status puts the ordered units back into stock.
    pub fn restores_stock(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    pub fn is_deletable(&self) -> bool {
        !matches!(self, Self::Shipped | Self::Completed)
    }

    /// Human label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "being processed",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "PAID" => Self::Paid,
            "REFUNDED" => Self::Refunded,
            _ => Self::Unpaid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
            Self::Refunded => "REFUNDED",
        }
    }
}

/// Shipping address as captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ShippingAddress {
    pub address: String,
    pub ward: Option<String>,
    pub district: Option<String>,
    pub city: String,
}

/// Maps to the `orders` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub shipping_cost: i64,
    pub total: i64,
    pub promotion_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `ATL-<unix millis>-<4 uppercase hex>`
pub fn generate_order_no() -> String {
    let suffix: u16 = rand::rng().random();
    format!("ATL-{}-{:04X}", Utc::now().timestamp_millis(), suffix)
}

/// Maps to `order_items`. Name and price are snapshots taken at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
}

/// Everything the checkout transaction writes.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub cart_id: Uuid,
    pub promotion_id: Option<Uuid>,
}

impl OrderDraft {
    /// True when the locked cart still holds exactly the priced lines.
    pub fn matches_cart(&self, lines: &[(Uuid, i32, i64)]) -> bool {
        same_lines(&self.items, lines)
    }
}

fn same_lines(items: &[OrderItem], lines: &[(Uuid, i32, i64)]) -> bool {
    let mut drafted: Vec<(Uuid, i32, i64)> = items
        .iter()
        .map(|item| (item.product_id, item.quantity, item.unit_price))
        .collect();
    let mut current = lines.to_vec();
    drafted.sort_unstable();
    current.sort_unstable();
    drafted == current
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OrderStats {
    pub total_orders: i64,
    pub by_status: Vec<StatusCount>,
    /// Sum of totals of PAID orders
    pub revenue: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Run the checkout transaction. Fails with `Conflict` when stock ran
    /// out, the cart is no longer active or the promotion limit was hit.
    async fn place(&self, draft: &OrderDraft) -> Result<Order, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, AppError>;

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>;

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<Order>, i64), AppError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, AppError>;

    /// Set the status, returning items to stock in the same transaction when asked.
    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        restore_stock: bool,
    ) -> Result<Order, AppError>;

    async fn update_details(&self, order: &Order) -> Result<Order, AppError>;

    /// Deletes the order, restocking it unless it was cancelled or returned.
    /// Returns whether stock was restored.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn stats(&self) -> Result<OrderStats, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OrderStatus::Pending, OrderStatus::Confirmed, true)]
    #[test_case(OrderStatus::Pending, OrderStatus::Shipped, false)]
    #[test_case(OrderStatus::Confirmed, OrderStatus::Completed, true)]
    #[test_case(OrderStatus::Shipped, OrderStatus::Returned, true)]
    #[test_case(OrderStatus::Completed, OrderStatus::Returned, true)]
    #[test_case(OrderStatus::Completed, OrderStatus::Cancelled, false)]
    #[test_case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    #[test_case(OrderStatus::Returned, OrderStatus::Completed, false)]
    fn validates_transitions(from: OrderStatus, to: OrderStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_have_no_transitions() {
        assert!(OrderStatus::Cancelled.allowed_transitions().is_empty());
        assert!(OrderStatus::Returned.allowed_transitions().is_empty());
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn order_numbers_have_expected_shape() {
        let no = generate_order_no();
        let parts: Vec<&str> = no.split('-').collect();
        assert_eq!(parts[0], "ATL");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn shipped_and_completed_orders_are_kept() {
        assert!(!OrderStatus::Shipped.is_deletable());
        assert!(!OrderStatus::Completed.is_deletable());
        assert!(OrderStatus::Cancelled.is_deletable());
    }

    fn line(product_id: Uuid, quantity: i32, unit_price: i64) -> OrderItem {
        OrderItem {
            id: Uuid::now_v7(),
            order_id: Uuid::nil(),
            product_id,
            product_name: "Loa".into(),
            quantity,
            unit_price,
            total_price: unit_price * i64::from(quantity),
        }
    }

    #[test]
    fn cart_lines_must_match_the_priced_draft() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let items = vec![line(a, 1, 500_000), line(b, 2, 90_000)];

        assert!(same_lines(&items, &[(b, 2, 90_000), (a, 1, 500_000)]));
        assert!(!same_lines(&items, &[(a, 1, 500_000)]));
        assert!(!same_lines(&items[..1], &[(a, 1, 500_000), (b, 2, 90_000)]));
        assert!(!same_lines(&items, &[(a, 1, 500_000), (b, 3, 90_000)]));
        assert!(!same_lines(&items, &[(a, 1, 450_000), (b, 2, 90_000)]));
    }
}
