//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, login, JWT and refresh token rotation
//! - **UserService**: Account administration for staff
//! - **CatalogService**: Products and categories, with cached listings
//! - **InventoryService**: Stock levels and the movement ledger
//! - **CartService**: User and guest carts with stock reservations
//! - **PromotionService**: Discount codes
//! - **CheckoutService**: Cart to order conversion
//! - **OrderService**: Order status machine and administration
//! - **PaymentService**: Provider payments and webhooks
//! - **ServiceCatalogService**: Service types, services and technicians
//! - **BookingService**: Service visit bookings
//! - **NotificationService**: In-app notifications

pub mod auth_service;
pub mod booking_service;
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod inventory_service;
pub mod notification_service;
pub mod order_service;
pub mod payment_service;
pub mod promotion_service;
pub mod service_catalog_service;
pub mod user_service;

pub use auth_service::{
    hash_refresh_token, AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims, RegisterDto,
    TokenKeys,
};

pub use user_service::{UserError, UserService, UserServiceImpl};

pub use catalog_service::{CatalogError, CatalogService, CatalogServiceImpl, ProductDetail};

pub use inventory_service::{
    AdjustmentView, InventoryError, InventoryService, InventoryServiceImpl, InventoryView,
};

pub use cart_service::{CartError, CartService, CartServiceImpl, CartView};

pub use promotion_service::{
    AppliedPromotion, PromotionError, PromotionService, PromotionServiceImpl,
};

pub use checkout_service::{CheckoutError, CheckoutService, CheckoutServiceImpl};

pub use order_service::{OrderDetail, OrderError, OrderService, OrderServiceImpl, Viewer};

pub use payment_service::{
    IntentCreated, PaymentError, PaymentService, PaymentServiceImpl, WebhookOutcome,
};

pub use service_catalog_service::{
    ServiceCatalogError, ServiceCatalogService, ServiceCatalogServiceImpl, ServiceDetail,
};

pub use booking_service::{BookingDetail, BookingError, BookingService, BookingServiceImpl};

pub use notification_service::{
    NotificationError, NotificationPage, NotificationService, NotificationServiceImpl,
};
