//! Cart Service
//!
//! User and guest carts. Every quantity change reserves or releases stock in
//! the same transaction as the line change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::services::PricingPolicy;
use crate::domain::{
    Cart, CartItem, CartOwner, CartRepository, CartStatus, LineChange, LineQuantity, Product,
    ProductRepository,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

#[async_trait]
pub trait CartService: Send + Sync {
    async fn create_guest_cart(&self) -> Result<CartView, CartError>;

    async fn get_cart(&self, owner: &CartOwner) -> Result<CartView, CartError>;

    async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, CartError>;

    /// Zero or less removes the line.
    async fn update_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, CartError>;

    async fn remove_item(&self, owner: &CartOwner, product_id: Uuid) -> Result<CartView, CartError>;

    async fn clear(&self, owner: &CartOwner) -> Result<CartView, CartError>;

    async fn merge_guest_cart(&self, guest_id: &str, user_id: Uuid) -> Result<CartView, CartError>;

    /// Abandon expired guest carts and release their reservations.
    async fn cleanup_expired_guest_carts(&self) -> Result<u64, CartError>;
}

/// Cart with its lines and totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<String>,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub item_count: i64,
    pub subtotal: i64,
    pub shipping_estimate: i64,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CartView {
    pub fn new(cart: Cart, items: Vec<CartItem>, pricing: &PricingPolicy) -> Self {
        let subtotal = PricingPolicy::subtotal(&items);
        let quote = pricing.quote(subtotal, 0, false);
        let shipping_estimate = if items.is_empty() { 0 } else { quote.shipping };

        Self {
            id: cart.id,
            guest_id: cart.guest_id,
            status: cart.status,
            item_count: PricingPolicy::item_count(&items),
            subtotal,
            shipping_estimate,
            total: subtotal + shipping_estimate,
            items,
            expires_at: cart.expires_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart has expired")]
    CartExpired,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Product is not available")]
    ProductUnavailable,

    #[error("Insufficient stock, only {available} available")]
    InsufficientStock { available: i32 },

    #[error("Item not found in cart")]
    ItemNotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::CartNotFound
            | CartError::CartExpired
            | CartError::ProductNotFound
            | CartError::ItemNotFound => AppError::NotFound(err.to_string()),
            CartError::ProductUnavailable | CartError::InsufficientStock { .. } => {
                AppError::BadRequest(err.to_string())
            }
            CartError::Repository(e) => e,
        }
    }
}

pub struct CartServiceImpl<C, P>
where
    C: CartRepository,
    P: ProductRepository,
{
    cart_repo: Arc<C>,
    product_repo: Arc<P>,
    pricing: PricingPolicy,
    guest_cart_ttl_days: i64,
}

impl<C, P> CartServiceImpl<C, P>
where
    C: CartRepository,
    P: ProductRepository,
{
    pub fn new(
        cart_repo: Arc<C>,
        product_repo: Arc<P>,
        pricing: PricingPolicy,
        guest_cart_ttl_days: i64,
    ) -> Self {
        Self {
            cart_repo,
            product_repo,
            pricing,
            guest_cart_ttl_days,
        }
    }

    /// User carts are created on first use; guest carts must exist.
    async fn resolve(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        if let Some(cart) = self.cart_repo.find_active(owner).await? {
            if cart.is_expired(Utc::now()) {
                return Err(CartError::CartExpired);
            }
            return Ok(cart);
        }

        match owner {
            CartOwner::Guest(_) => Err(CartError::CartNotFound),
            CartOwner::User(user_id) => match self
                .cart_repo
                .create(&Cart::for_user(*user_id))
                .await
            {
                Ok(cart) => Ok(cart),
                // Lost a race with a concurrent request creating the same cart
                Err(AppError::Conflict(_)) => self
                    .cart_repo
                    .find_active(owner)
                    .await?
                    .ok_or(CartError::CartNotFound),
                Err(e) => Err(e.into()),
            },
        }
    }

    async fn view(&self, cart: Cart) -> Result<CartView, CartError> {
        let items = self.cart_repo.items(cart.id).await?;
        Ok(CartView::new(cart, items, &self.pricing))
    }

    async fn purchasable(&self, product_id: Uuid) -> Result<Product, CartError> {
        let product = self
            .product_repo
            .find_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.is_available() {
            return Err(CartError::ProductUnavailable);
        }
        Ok(product)
    }

    async fn apply(
        &self,
        cart: &Cart,
        product: &Product,
        quantity: LineQuantity,
    ) -> Result<(), CartError> {
        match self
            .cart_repo
            .change_line(cart.id, product.id, quantity, product.price)
            .await?
        {
            LineChange::Applied { .. } => Ok(()),
            LineChange::InsufficientStock { available } => {
                Err(CartError::InsufficientStock { available })
            }
        }
    }
}

#[async_trait]
impl<C, P> CartService for CartServiceImpl<C, P>
where
    C: CartRepository + 'static,
    P: ProductRepository + 'static,
{
    async fn create_guest_cart(&self) -> Result<CartView, CartError> {
        let cart = self
            .cart_repo
            .create(&Cart::for_guest(self.guest_cart_ttl_days))
            .await?;
        info!(cart_id = %cart.id, "Guest cart created");
        Ok(CartView::new(cart, Vec::new(), &self.pricing))
    }

    async fn get_cart(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let cart = self.resolve(owner).await?;
        self.view(cart).await
    }

    async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        let product = self.purchasable(product_id).await?;
        let cart = self.resolve(owner).await?;
        self.apply(&cart, &product, LineQuantity::Add(quantity)).await?;
        self.view(cart).await
    }

    async fn update_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        let cart = self.resolve(owner).await?;

        if quantity <= 0 {
            if !self.cart_repo.remove_line(cart.id, product_id).await? {
                return Err(CartError::ItemNotFound);
            }
            return self.view(cart).await;
        }

        let items = self.cart_repo.items(cart.id).await?;
        if !items.iter().any(|item| item.product_id == product_id) {
            return Err(CartError::ItemNotFound);
        }

        let product = self.purchasable(product_id).await?;
        self.apply(&cart, &product, LineQuantity::Set(quantity)).await?;
        self.view(cart).await
    }

    async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
    ) -> Result<CartView, CartError> {
        let cart = self.resolve(owner).await?;
        if !self.cart_repo.remove_line(cart.id, product_id).await? {
            return Err(CartError::ItemNotFound);
        }
        self.view(cart).await
    }

    async fn clear(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let cart = self.resolve(owner).await?;
        self.cart_repo.clear(cart.id).await?;
        Ok(CartView::new(cart, Vec::new(), &self.pricing))
    }

    #[instrument(skip(self))]
    async fn merge_guest_cart(&self, guest_id: &str, user_id: Uuid) -> Result<CartView, CartError> {
        let guest = self.resolve(&CartOwner::Guest(guest_id.to_string())).await?;

        let cart = match self.cart_repo.find_active(&CartOwner::User(user_id)).await? {
            Some(user_cart) => {
                self.cart_repo.merge_into(guest.id, user_cart.id).await?;
                user_cart
            }
            None => self.cart_repo.assign_to_user(guest.id, user_id).await?,
        };

        info!(cart_id = %cart.id, user_id = %user_id, "Guest cart merged");
        self.view(cart).await
    }

    async fn cleanup_expired_guest_carts(&self) -> Result<u64, CartError> {
        let abandoned = self.cart_repo.abandon_expired(Utc::now()).await?;
        if abandoned > 0 {
            metrics::record_carts_abandoned(abandoned);
            info!(count = abandoned, "Expired guest carts abandoned");
        }
        Ok(abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockCartRepository, MockProductRepository};
    use chrono::Duration;
    use mockall::predicate::{always, eq};
    use pretty_assertions::assert_eq;

    fn product(price: i64, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::now_v7(),
            category_id: None,
            name: "Loa".into(),
            slug: "loa".into(),
            sku: "LOA-001".into(),
            description: None,
            short_description: None,
            price,
            original_price: None,
            images: vec![],
            is_active: active,
            is_featured: false,
            meta_title: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(cart_id: Uuid, product_id: Uuid, unit_price: i64, quantity: i32) -> CartItem {
        let now = Utc::now();
        CartItem {
            id: Uuid::now_v7(),
            cart_id,
            product_id,
            product_name: "Loa".into(),
            product_slug: "loa".into(),
            product_image: None,
            quantity,
            unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        carts: MockCartRepository,
        products: MockProductRepository,
    ) -> CartServiceImpl<MockCartRepository, MockProductRepository> {
        CartServiceImpl::new(Arc::new(carts), Arc::new(products), PricingPolicy::default(), 7)
    }

    #[test]
    fn view_totals_match_lines() {
        let cart = Cart::for_user(Uuid::now_v7());
        let items = vec![
            line(cart.id, Uuid::now_v7(), 1_200_000, 2),
            line(cart.id, Uuid::now_v7(), 300_000, 1),
        ];
        let view = CartView::new(cart, items, &PricingPolicy::default());

        assert_eq!(view.subtotal, 2_700_000);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.shipping_estimate, 50_000);
        assert_eq!(view.total, 2_750_000);
    }

    #[test]
    fn empty_cart_has_no_shipping() {
        let view = CartView::new(Cart::for_user(Uuid::now_v7()), vec![], &PricingPolicy::default());
        assert_eq!((view.subtotal, view.shipping_estimate, view.total), (0, 0, 0));
    }

    #[tokio::test]
    async fn user_cart_is_created_on_first_use() {
        let user_id = Uuid::now_v7();
        let mut carts = MockCartRepository::new();
        carts.expect_find_active().returning(|_| Ok(None));
        carts
            .expect_create()
            .withf(move |c| c.user_id == Some(user_id))
            .times(1)
            .returning(|c| Ok(c.clone()));
        carts.expect_items().returning(|_| Ok(vec![]));

        let view = service(carts, MockProductRepository::new())
            .get_cart(&CartOwner::User(user_id))
            .await
            .unwrap();
        assert_eq!(view.status, CartStatus::Active);
    }

    #[tokio::test]
    async fn unknown_guest_cart_is_not_found() {
        let mut carts = MockCartRepository::new();
        carts.expect_find_active().returning(|_| Ok(None));
        carts.expect_create().never();

        let err = service(carts, MockProductRepository::new())
            .get_cart(&CartOwner::Guest("guest_1_abc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::CartNotFound));
    }

    #[tokio::test]
    async fn expired_guest_cart_is_rejected() {
        let mut cart = Cart::for_guest(7);
        cart.expires_at = Some(Utc::now() - Duration::hours(1));

        let mut carts = MockCartRepository::new();
        carts
            .expect_find_active()
            .returning(move |_| Ok(Some(cart.clone())));

        let err = service(carts, MockProductRepository::new())
            .get_cart(&CartOwner::Guest("g".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::CartExpired));
    }

    #[tokio::test]
    async fn add_item_reserves_at_current_price() {
        let p = product(990_000, true);
        let pid = p.id;
        let cart = Cart::for_user(Uuid::now_v7());
        let cart_id = cart.id;

        let mut products = MockProductRepository::new();
        products
            .expect_find_by_id()
            .returning(move |_| Ok(Some(p.clone())));

        let mut carts = MockCartRepository::new();
        carts
            .expect_find_active()
            .returning(move |_| Ok(Some(cart.clone())));
        carts
            .expect_change_line()
            .with(eq(cart_id), eq(pid), eq(LineQuantity::Add(2)), eq(990_000))
            .times(1)
            .returning(|_, _, _, _| Ok(LineChange::Applied { previous: 0, current: 2 }));
        carts
            .expect_items()
            .returning(move |cid| Ok(vec![line(cid, pid, 990_000, 2)]));

        let view = service(carts, products)
            .add_item(&CartOwner::User(Uuid::now_v7()), pid, 2)
            .await
            .unwrap();
        assert_eq!(view.subtotal, 1_980_000);
    }

    #[tokio::test]
    async fn add_item_surfaces_insufficient_stock() {
        let p = product(100, true);
        let mut products = MockProductRepository::new();
        products
            .expect_find_by_id()
            .returning(move |_| Ok(Some(p.clone())));

        let mut carts = MockCartRepository::new();
        carts
            .expect_find_active()
            .returning(|_| Ok(Some(Cart::for_user(Uuid::now_v7()))));
        carts
            .expect_change_line()
            .returning(|_, _, _, _| Ok(LineChange::InsufficientStock { available: 1 }));

        let err = service(carts, products)
            .add_item(&CartOwner::User(Uuid::now_v7()), Uuid::now_v7(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { available: 1 }));
    }

    #[tokio::test]
    async fn add_item_rejects_inactive_product() {
        let mut products = MockProductRepository::new();
        products
            .expect_find_by_id()
            .returning(|_| Ok(Some(product(100, false))));

        let err = service(MockCartRepository::new(), products)
            .add_item(&CartOwner::User(Uuid::now_v7()), Uuid::now_v7(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductUnavailable));
    }

    #[tokio::test]
    async fn zero_quantity_removes_line() {
        let mut carts = MockCartRepository::new();
        carts
            .expect_find_active()
            .returning(|_| Ok(Some(Cart::for_user(Uuid::now_v7()))));
        carts
            .expect_remove_line()
            .times(1)
            .returning(|_, _| Ok(true));
        carts.expect_change_line().never();
        carts.expect_items().returning(|_| Ok(vec![]));

        service(carts, MockProductRepository::new())
            .update_item(&CartOwner::User(Uuid::now_v7()), Uuid::now_v7(), 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn merge_reowns_guest_cart_when_user_has_none() {
        let guest = Cart::for_guest(7);
        let guest_cart_id = guest.id;
        let user_id = Uuid::now_v7();

        let mut carts = MockCartRepository::new();
        carts.expect_find_active().returning(move |owner| match owner {
            CartOwner::Guest(_) => Ok(Some(guest.clone())),
            CartOwner::User(_) => Ok(None),
        });
        carts
            .expect_assign_to_user()
            .with(eq(guest_cart_id), eq(user_id))
            .times(1)
            .returning(|id, uid| {
                let mut cart = Cart::for_user(uid);
                cart.id = id;
                Ok(cart)
            });
        carts.expect_merge_into().never();
        carts.expect_items().returning(|_| Ok(vec![]));

        let view = service(carts, MockProductRepository::new())
            .merge_guest_cart("guest_1_abc", user_id)
            .await
            .unwrap();
        assert_eq!(view.id, guest_cart_id);
    }

    #[tokio::test]
    async fn merge_folds_into_existing_user_cart() {
        let guest = Cart::for_guest(7);
        let guest_cart_id = guest.id;
        let user_cart = Cart::for_user(Uuid::now_v7());
        let user_cart_id = user_cart.id;

        let mut carts = MockCartRepository::new();
        carts.expect_find_active().returning(move |owner| match owner {
            CartOwner::Guest(_) => Ok(Some(guest.clone())),
            CartOwner::User(_) => Ok(Some(user_cart.clone())),
        });
        carts
            .expect_merge_into()
            .with(eq(guest_cart_id), eq(user_cart_id))
            .times(1)
            .returning(|_, _| Ok(()));
        carts.expect_items().with(always()).returning(|_| Ok(vec![]));

        let view = service(carts, MockProductRepository::new())
            .merge_guest_cart("guest_1_abc", Uuid::now_v7())
            .await
            .unwrap();
        assert_eq!(view.id, user_cart_id);
    }
}
