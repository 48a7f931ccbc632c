//! Payment Service
//!
//! Starts provider payments for orders and settles them from provider
//! webhooks. Settlement is idempotent: a callback for an intent that already
//! succeeded changes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::services::order_service::Viewer;
use crate::domain::{
    Notification, NotificationRepository, NotificationType, Order, OrderRepository, OrderStatus,
    Payment, PaymentIntent, PaymentProvider, PaymentRepository, PaymentStatus, SettleOutcome,
};
use crate::infrastructure::metrics;
use crate::infrastructure::payments::{CheckoutRequest, PaymentGateways};
use crate::shared::error::AppError;

const INTENT_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_intent(
        &self,
        order_id: Uuid,
        provider: &str,
        return_url: &str,
    ) -> Result<IntentCreated, PaymentError>;

    async fn handle_webhook(
        &self,
        provider: &str,
        payload: &Value,
    ) -> Result<WebhookOutcome, PaymentError>;

    async fn list_for_order(
        &self,
        order_id: Uuid,
        viewer: Viewer,
    ) -> Result<Vec<Payment>, PaymentError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntentCreated {
    pub intent_id: Uuid,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Paid,
    AlreadyPaid,
    Failed,
}

impl WebhookOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::AlreadyPaid => "duplicate",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Order has been cancelled")]
    OrderCancelled,

    #[error("Payment intent not found")]
    IntentNotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::OrderNotFound | PaymentError::IntentNotFound => {
                AppError::NotFound(err.to_string())
            }
            PaymentError::UnknownProvider(_)
            | PaymentError::AlreadyPaid
            | PaymentError::OrderCancelled => AppError::BadRequest(err.to_string()),
            PaymentError::Repository(e) => e,
        }
    }
}

fn parse_provider(provider: &str) -> Result<PaymentProvider, PaymentError> {
    PaymentProvider::from_str(provider)
        .ok_or_else(|| PaymentError::UnknownProvider(provider.to_string()))
}

pub struct PaymentServiceImpl<P, O, N>
where
    P: PaymentRepository,
    O: OrderRepository,
    N: NotificationRepository,
{
    payment_repo: Arc<P>,
    order_repo: Arc<O>,
    notification_repo: Arc<N>,
    gateways: PaymentGateways,
}

impl<P, O, N> PaymentServiceImpl<P, O, N>
where
    P: PaymentRepository,
    O: OrderRepository,
    N: NotificationRepository,
{
    pub fn new(
        payment_repo: Arc<P>,
        order_repo: Arc<O>,
        notification_repo: Arc<N>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            payment_repo,
            order_repo,
            notification_repo,
            gateways,
        }
    }

    /// Provider references are unique per provider; a clash gets a fresh one.
    async fn insert_intent(
        &self,
        order: &Order,
        provider: PaymentProvider,
        return_url: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut attempt = 1;
        loop {
            let intent =
                PaymentIntent::new(order.id, provider, order.total, return_url.to_string());
            match self.payment_repo.create_intent(&intent).await {
                Err(AppError::Conflict(_)) if attempt < INTENT_ATTEMPTS => {
                    warn!(
                        provider = provider.as_str(),
                        attempt,
                        "Payment reference clash, retrying"
                    );
                    attempt += 1;
                }
                result => return Ok(result?),
            }
        }
    }

    async fn notify_paid(&self, user_id: Uuid, order_id: Uuid, order_no: &str) {
        let notification = Notification::new(
            user_id,
            NotificationType::Payment,
            format!("Payment received for {order_no}"),
            format!("We received the payment for order {order_no}. Thank you!"),
            Some(serde_json::json!({ "order_id": order_id, "order_no": order_no })),
        );
        if let Err(e) = self.notification_repo.create(&notification).await {
            warn!(order_no, error = %e, "Failed to create payment notification");
        }
    }
}

#[async_trait]
impl<P, O, N> PaymentService for PaymentServiceImpl<P, O, N>
where
    P: PaymentRepository + 'static,
    O: OrderRepository + 'static,
    N: NotificationRepository + 'static,
{
    #[instrument(skip(self, return_url))]
    async fn create_intent(
        &self,
        order_id: Uuid,
        provider: &str,
        return_url: &str,
    ) -> Result<IntentCreated, PaymentError> {
        let provider = parse_provider(provider)?;
        let gateway = self.gateways.get(provider)?;

        let order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        if order.payment_status != PaymentStatus::Unpaid {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(PaymentError::OrderCancelled);
        }

        let intent = self.insert_intent(&order, provider, return_url).await?;

        let redirect_url = gateway
            .checkout_url(&CheckoutRequest {
                intent_id: intent.id,
                provider_ref: intent.provider_ref.clone(),
                amount: intent.amount,
                order_no: order.order_no.clone(),
                return_url: intent.return_url.clone(),
            })
            .await?;

        info!(
            order_no = %order.order_no,
            intent_id = %intent.id,
            provider = provider.as_str(),
            amount = intent.amount,
            "Payment intent created"
        );
        Ok(IntentCreated {
            intent_id: intent.id,
            redirect_url,
        })
    }

    #[instrument(skip(self, payload))]
    async fn handle_webhook(
        &self,
        provider: &str,
        payload: &Value,
    ) -> Result<WebhookOutcome, PaymentError> {
        let provider = parse_provider(provider)?;
        let gateway = self.gateways.get(provider)?;

        let event = match gateway.parse_webhook(payload) {
            Ok(event) => event,
            Err(e) => {
                metrics::record_payment_webhook(provider.as_str(), "rejected");
                return Err(e.into());
            }
        };

        let intent = self
            .payment_repo
            .find_intent_by_ref(provider, &event.provider_ref)
            .await?
            .ok_or(PaymentError::IntentNotFound)?;

        let outcome = if event.success {
            match self
                .payment_repo
                .mark_paid(intent.id, event.transaction_ref.clone())
                .await?
            {
                SettleOutcome::AlreadySettled => WebhookOutcome::AlreadyPaid,
                SettleOutcome::Settled {
                    order_id,
                    user_id,
                    order_no,
                } => {
                    info!(order_no = %order_no, intent_id = %intent.id, "Order paid");
                    self.notify_paid(user_id, order_id, &order_no).await;
                    WebhookOutcome::Paid
                }
            }
        } else {
            self.payment_repo.mark_failed(intent.id).await?;
            warn!(intent_id = %intent.id, provider = provider.as_str(), "Payment failed");
            WebhookOutcome::Failed
        };

        metrics::record_payment_webhook(provider.as_str(), outcome.as_str());
        Ok(outcome)
    }

    async fn list_for_order(
        &self,
        order_id: Uuid,
        viewer: Viewer,
    ) -> Result<Vec<Payment>, PaymentError> {
        let order = self
            .order_repo
            .find_by_id(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        if let Viewer::Customer(user_id) = viewer {
            if order.user_id != user_id {
                return Err(PaymentError::OrderNotFound);
            }
        }
        Ok(self.payment_repo.list_for_order(order_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::order_service::tests::order;
    use crate::domain::{MockNotificationRepository, MockOrderRepository, MockPaymentRepository};
    use crate::infrastructure::payments::{MockPaymentGateway, WebhookEvent};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    fn gateways(success: bool) -> PaymentGateways {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_provider()
            .return_const(PaymentProvider::Vnpay);
        gateway
            .expect_checkout_url()
            .returning(|req| Ok(format!("https://pay.example/{}", req.provider_ref)));
        gateway.expect_parse_webhook().returning(move |_| {
            Ok(WebhookEvent {
                provider_ref: "ref-1".into(),
                success,
                transaction_ref: Some("TX1".into()),
            })
        });
        PaymentGateways::default().with(Arc::new(gateway))
    }

    fn intent(order_id: Uuid) -> PaymentIntent {
        PaymentIntent::new(
            order_id,
            PaymentProvider::Vnpay,
            1_050_000,
            "https://shop/return".into(),
        )
    }

    #[tokio::test]
    async fn create_intent_for_unpaid_order() {
        let o = order(Uuid::now_v7(), OrderStatus::Pending);
        let order_id = o.id;

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(o.clone())));
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_create_intent()
            .withf(|i| i.amount == 1_050_000 && i.provider == PaymentProvider::Vnpay)
            .returning(|i| Ok(i.clone()));

        let svc = PaymentServiceImpl::new(
            Arc::new(payments),
            Arc::new(orders),
            Arc::new(MockNotificationRepository::new()),
            gateways(true),
        );
        let created = svc
            .create_intent(order_id, "vnpay", "https://shop/return")
            .await
            .unwrap();
        assert!(created.redirect_url.starts_with("https://pay.example/"));
    }

    #[tokio::test]
    async fn reference_clash_retries_with_a_fresh_intent() {
        let o = order(Uuid::now_v7(), OrderStatus::Pending);
        let order_id = o.id;

        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(o.clone())));
        let mut payments = MockPaymentRepository::new();
        let mut seq = mockall::Sequence::new();
        payments
            .expect_create_intent()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AppError::Conflict("Payment reference already in use".into())));
        payments
            .expect_create_intent()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|i| Ok(i.clone()));

        let svc = PaymentServiceImpl::new(
            Arc::new(payments),
            Arc::new(orders),
            Arc::new(MockNotificationRepository::new()),
            gateways(true),
        );
        svc.create_intent(order_id, "vnpay", "https://shop/return")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_orders_cannot_be_paid() {
        let o = order(Uuid::now_v7(), OrderStatus::Cancelled);
        let mut orders = MockOrderRepository::new();
        orders
            .expect_find_by_id()
            .returning(move |_| Ok(Some(o.clone())));

        let svc = PaymentServiceImpl::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(orders),
            Arc::new(MockNotificationRepository::new()),
            gateways(true),
        );
        let err = svc
            .create_intent(Uuid::now_v7(), "VNPAY", "https://shop/return")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderCancelled));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_rejected() {
        let svc = PaymentServiceImpl::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockNotificationRepository::new()),
            gateways(true),
        );
        let err = svc
            .create_intent(Uuid::now_v7(), "momo", "https://shop/return")
            .await
            .unwrap_err();
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn successful_webhook_settles_and_notifies() {
        let order_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let i = intent(order_id);
        let intent_id = i.id;

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_intent_by_ref()
            .with(eq(PaymentProvider::Vnpay), eq("ref-1"))
            .returning(move |_, _| Ok(Some(i.clone())));
        payments
            .expect_mark_paid()
            .with(eq(intent_id), eq(Some("TX1".to_string())))
            .times(1)
            .returning(move |_, _| {
                Ok(SettleOutcome::Settled {
                    order_id,
                    user_id,
                    order_no: "ATL-1-ABCD".into(),
                })
            });

        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_create()
            .withf(move |n| {
                n.user_id == user_id && n.notification_type == NotificationType::Payment
            })
            .times(1)
            .returning(|n| Ok(n.clone()));

        let svc = PaymentServiceImpl::new(
            Arc::new(payments),
            Arc::new(MockOrderRepository::new()),
            Arc::new(notifications),
            gateways(true),
        );
        let outcome = svc
            .handle_webhook("vnpay", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Paid);
    }

    #[tokio::test]
    async fn repeated_webhook_is_a_no_op() {
        let i = intent(Uuid::now_v7());
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_intent_by_ref()
            .returning(move |_, _| Ok(Some(i.clone())));
        payments
            .expect_mark_paid()
            .returning(|_, _| Ok(SettleOutcome::AlreadySettled));

        let mut notifications = MockNotificationRepository::new();
        notifications.expect_create().never();

        let svc = PaymentServiceImpl::new(
            Arc::new(payments),
            Arc::new(MockOrderRepository::new()),
            Arc::new(notifications),
            gateways(true),
        );
        let outcome = svc
            .handle_webhook("vnpay", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::AlreadyPaid);
    }

    #[tokio::test]
    async fn failed_webhook_marks_intent_failed() {
        let i = intent(Uuid::now_v7());
        let intent_id = i.id;
        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_intent_by_ref()
            .returning(move |_, _| Ok(Some(i.clone())));
        payments
            .expect_mark_failed()
            .with(eq(intent_id))
            .times(1)
            .returning(|_| Ok(()));
        payments.expect_mark_paid().never();

        let svc = PaymentServiceImpl::new(
            Arc::new(payments),
            Arc::new(MockOrderRepository::new()),
            Arc::new(MockNotificationRepository::new()),
            gateways(false),
        );
        let outcome = svc
            .handle_webhook("vnpay", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Failed);
    }
}
