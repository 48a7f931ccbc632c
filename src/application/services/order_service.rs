//! Order Service
//!
//! Order lookup, the status machine and administration. Stock restoration
//! for cancelled, returned and deleted orders happens in the repository
//! transaction that changes the order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Notification, NotificationRepository, NotificationType, Order, OrderItem, OrderRepository,
    OrderStats, OrderStatus, ShippingAddress,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{PageRequest, Paginated};

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Paginated<Order>, OrderError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError>;

    /// `key` is an order id or an order number.
    async fn get(&self, key: &str, viewer: Viewer) -> Result<OrderDetail, OrderError>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, OrderError>;

    async fn update(
        &self,
        id: Uuid,
        notes: Option<String>,
        shipping_address: Option<ShippingAddress>,
    ) -> Result<Order, OrderError>;

    async fn delete(&self, id: Uuid) -> Result<(), OrderError>;

    async fn stats(&self) -> Result<OrderStats, OrderError>;
}

/// Who is looking at an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Admin,
    Customer(Uuid),
}

/// Order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotFound,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Orders that are {0} cannot be deleted")]
    NotDeletable(&'static str),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound => AppError::NotFound(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::NotDeletable(_) => {
                AppError::BadRequest(err.to_string())
            }
            OrderError::Repository(e) => e,
        }
    }
}

pub struct OrderServiceImpl<O, N>
where
    O: OrderRepository,
    N: NotificationRepository,
{
    order_repo: Arc<O>,
    notification_repo: Arc<N>,
}

impl<O, N> OrderServiceImpl<O, N>
where
    O: OrderRepository,
    N: NotificationRepository,
{
    pub fn new(order_repo: Arc<O>, notification_repo: Arc<N>) -> Self {
        Self {
            order_repo,
            notification_repo,
        }
    }

    async fn find(&self, id: Uuid) -> Result<Order, OrderError> {
        self.order_repo
            .find_by_id(id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    async fn notify_status(&self, order: &Order) {
        let notification = Notification::new(
            order.user_id,
            NotificationType::Order,
            format!("Order {}", order.order_no),
            format!("Your order {} is now {}.", order.order_no, order.status.label()),
            Some(serde_json::json!({
                "order_id": order.id,
                "order_no": order.order_no,
                "status": order.status,
            })),
        );
        if let Err(e) = self.notification_repo.create(&notification).await {
            warn!(order_no = %order.order_no, error = %e, "Failed to create order notification");
        }
    }
}

#[async_trait]
impl<O, N> OrderService for OrderServiceImpl<O, N>
where
    O: OrderRepository + 'static,
    N: NotificationRepository + 'static,
{
    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Paginated<Order>, OrderError> {
        let (orders, total) = self.order_repo.list(status, page).await?;
        Ok(Paginated::new(orders, page, total))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.order_repo.list_for_user(user_id).await?)
    }

    async fn get(&self, key: &str, viewer: Viewer) -> Result<OrderDetail, OrderError> {
        let order = match Uuid::parse_str(key) {
            Ok(id) => self.order_repo.find_by_id(id).await?,
            Err(_) => self.order_repo.find_by_order_no(key).await?,
        }
        .ok_or(OrderError::NotFound)?;

        // Other customers' orders are reported as missing
        if let Viewer::Customer(user_id) = viewer {
            if order.user_id != user_id {
                return Err(OrderError::NotFound);
            }
        }

        let items = self.order_repo.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, OrderError> {
        let current = self.find(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: current.status.as_str(),
                to: status.as_str(),
            });
        }

        let updated = self
            .order_repo
            .update_status(id, status, status.restores_stock())
            .await?;

        info!(
            order_no = %updated.order_no,
            from = current.status.as_str(),
            to = status.as_str(),
            "Order status changed"
        );
        self.notify_status(&updated).await;
        Ok(updated)
    }

    async fn update(
        &self,
        id: Uuid,
        notes: Option<String>,
        shipping_address: Option<ShippingAddress>,
    ) -> Result<Order, OrderError> {
        let mut order = self.find(id).await?;
        if let Some(notes) = notes {
            order.notes = Some(notes);
        }
        if let Some(address) = shipping_address {
            order.shipping_address = address;
        }
        order.updated_at = Utc::now();
        Ok(self.order_repo.update_details(&order).await?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), OrderError> {
        let order = self.find(id).await?;
        if !order.status.is_deletable() {
            return Err(OrderError::NotDeletable(order.status.label()));
        }

        let restored = self.order_repo.delete(id).await?;

        info!(order_no = %order.order_no, restored_stock = restored, "Order deleted");
        Ok(())
    }

    async fn stats(&self) -> Result<OrderStats, OrderError> {
        Ok(self.order_repo.stats().await?)
    }
}
