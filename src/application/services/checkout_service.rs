//! Checkout Service
//!
//! Turns an active cart into an order. Stock deduction, reservation release,
//! promotion usage and cart conversion all happen in one repository
//! transaction; notifications follow after commit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::request::CheckoutRequest;
use crate::application::services::order_service::OrderDetail;
use crate::application::services::promotion_service::{apply_code, PromotionError};
use crate::domain::services::PricingPolicy;
use crate::domain::{
    generate_order_no, CartOwner, CartRepository, Notification, NotificationRepository,
    NotificationType, Order, OrderDraft, OrderItem, OrderRepository, OrderStatus, PaymentStatus,
    ProductRepository, PromotionRepository, ShippingAddress, User, UserRepository,
};
use crate::infrastructure::metrics;
use crate::infrastructure::telegram::{order_message, StaffNotifier};
use crate::shared::error::AppError;

#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// `user_id` is `None` for guest checkouts, which must carry a guest id.
    async fn place_order(
        &self,
        user_id: Option<Uuid>,
        request: CheckoutRequest,
    ) -> Result<OrderDetail, CheckoutError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Guest checkout requires a guest_id")]
    GuestIdRequired,

    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart has expired")]
    CartExpired,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product {0} is no longer available")]
    ProductUnavailable(String),

    #[error(transparent)]
    Promotion(#[from] PromotionError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::CartNotFound | CheckoutError::CartExpired => {
                AppError::NotFound(err.to_string())
            }
            CheckoutError::GuestIdRequired
            | CheckoutError::EmptyCart
            | CheckoutError::ProductUnavailable(_) => AppError::BadRequest(err.to_string()),
            // An unusable code fails the checkout as a bad request
            CheckoutError::Promotion(PromotionError::Repository(e)) => e,
            CheckoutError::Promotion(e) => AppError::BadRequest(e.to_string()),
            CheckoutError::Repository(e) => e,
        }
    }
}

pub struct CheckoutServiceImpl<C, P, R, U, O, N, T>
where
    C: CartRepository,
    P: ProductRepository,
    R: PromotionRepository,
    U: UserRepository,
    O: OrderRepository,
    N: NotificationRepository,
    T: StaffNotifier,
{
    cart_repo: Arc<C>,
    product_repo: Arc<P>,
    promotion_repo: Arc<R>,
    user_repo: Arc<U>,
    order_repo: Arc<O>,
    notification_repo: Arc<N>,
    notifier: Arc<T>,
    pricing: PricingPolicy,
}

impl<C, P, R, U, O, N, T> CheckoutServiceImpl<C, P, R, U, O, N, T>
where
    C: CartRepository,
    P: ProductRepository,
    R: PromotionRepository,
    U: UserRepository,
    O: OrderRepository,
    N: NotificationRepository,
    T: StaffNotifier,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart_repo: Arc<C>,
        product_repo: Arc<P>,
        promotion_repo: Arc<R>,
        user_repo: Arc<U>,
        order_repo: Arc<O>,
        notification_repo: Arc<N>,
        notifier: Arc<T>,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            cart_repo,
            product_repo,
            promotion_repo,
            user_repo,
            order_repo,
            notification_repo,
            notifier,
            pricing,
        }
    }

    /// Guests are matched to an existing account by email, or get a
    /// password-less one.
    async fn customer_id(
        &self,
        user_id: Option<Uuid>,
        request: &CheckoutRequest,
    ) -> Result<Uuid, CheckoutError> {
        if let Some(id) = user_id {
            return Ok(id);
        }

        let email = request.customer_email.trim().to_lowercase();
        if let Some(existing) = self.user_repo.find_by_email(&email).await? {
            return Ok(existing.id);
        }

        let guest = User::new_guest(
            email,
            request.customer_name.trim(),
            Some(request.customer_phone.trim().to_string()),
        );
        Ok(self.user_repo.create(&guest).await?.id)
    }

    async fn notify_customer(&self, order: &Order) {
        let notification = Notification::new(
            order.user_id,
            NotificationType::Order,
            format!("Order {} placed", order.order_no),
            format!(
                "We received your order {}. Total: {} VND.",
                order.order_no, order.total
            ),
            Some(serde_json::json!({ "order_id": order.id, "order_no": order.order_no })),
        );
        if let Err(e) = self.notification_repo.create(&notification).await {
            warn!(order_no = %order.order_no, error = %e, "Failed to create order notification");
        }
    }
}

#[async_trait]
impl<C, P, R, U, O, N, T> CheckoutService for CheckoutServiceImpl<C, P, R, U, O, N, T>
where
    C: CartRepository + 'static,
    P: ProductRepository + 'static,
    R: PromotionRepository + 'static,
    U: UserRepository + 'static,
    O: OrderRepository + 'static,
    N: NotificationRepository + 'static,
    T: StaffNotifier + 'static,
{
    #[instrument(skip(self, request), fields(guest = user_id.is_none()))]
    async fn place_order(
        &self,
        user_id: Option<Uuid>,
        request: CheckoutRequest,
    ) -> Result<OrderDetail, CheckoutError> {
        let owner = match (user_id, request.guest_id.as_deref()) {
            (Some(id), _) => CartOwner::User(id),
            (None, Some(guest_id)) if !guest_id.trim().is_empty() => {
                CartOwner::Guest(guest_id.trim().to_string())
            }
            (None, _) => return Err(CheckoutError::GuestIdRequired),
        };

        let now = Utc::now();
        let cart = self
            .cart_repo
            .find_active(&owner)
            .await?
            .ok_or(CheckoutError::CartNotFound)?;
        if cart.is_expired(now) {
            return Err(CheckoutError::CartExpired);
        }

        let lines = self.cart_repo.items(cart.id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        for line in &lines {
            let available = self
                .product_repo
                .find_by_id(line.product_id)
                .await?
                .is_some_and(|p| p.is_available());
            if !available {
                return Err(CheckoutError::ProductUnavailable(line.product_name.clone()));
            }
        }

        let subtotal = PricingPolicy::subtotal(&lines);
        let applied = match request
            .promotion_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            Some(code) => {
                Some(apply_code(self.promotion_repo.as_ref(), code, subtotal, now).await?.1)
            }
            None => None,
        };

        let quote = self.pricing.quote(
            subtotal,
            applied.as_ref().map_or(0, |a| a.discount),
            applied.as_ref().is_some_and(|a| a.free_shipping),
        );

        let customer_id = self.customer_id(user_id, &request).await?;
        let address = ShippingAddress::from(request.shipping_address);

        let order = Order {
            id: Uuid::now_v7(),
            order_no: generate_order_no(),
            user_id: customer_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            customer_name: request.customer_name.trim().to_string(),
            customer_email: request.customer_email.trim().to_lowercase(),
            customer_phone: request.customer_phone.trim().to_string(),
            shipping_address: address,
            subtotal: quote.subtotal,
            discount_amount: quote.discount,
            shipping_cost: quote.shipping,
            total: quote.total,
            promotion_code: applied.as_ref().map(|a| a.code.clone()),
            notes: request
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::now_v7(),
                order_id: order.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.line_total(),
            })
            .collect();

        let draft = OrderDraft {
            order,
            items,
            cart_id: cart.id,
            promotion_id: applied.as_ref().map(|a| a.promotion_id),
        };
        let order = self.order_repo.place(&draft).await?;

        metrics::record_order_placed(user_id.is_none());
        info!(
            order_no = %order.order_no,
            total = order.total,
            items = draft.items.len(),
            promotion = ?order.promotion_code,
            "Order placed"
        );

        self.notify_customer(&order).await;

        let notifier = Arc::clone(&self.notifier);
        let text = order_message(&order, &draft.items);
        tokio::spawn(async move {
            notifier.send_message(&text).await;
        });

        Ok(OrderDetail {
            order,
            items: draft.items,
        })
    }
}
