//! # Domain Entities
//!
//! Business objects of the shop. Each entity maps to a database table and
//! comes with a repository trait implemented in the infrastructure layer.
//!
//! ## Storefront
//!
//! - **Product**, **Category**: the catalog
//! - **InventoryLevel**: stock and cart reservations per product
//! - **Cart**: user and guest carts with reserved lines
//! - **Order**: placed orders and their status machine
//! - **PaymentIntent**: provider payments for orders
//! - **Promotion**: discount codes
//!
//! ## Services
//!
//! - **ServiceType**, **Service**, **ServiceItem**, **Technician**
//! - **Booking**: scheduled service visits
//!
//! ## Accounts
//!
//! - **User**, **Session**, **Notification**

mod booking;
mod cart;
mod category;
mod inventory;
mod notification;
mod order;
mod payment;
mod product;
mod promotion;
mod service_catalog;
mod session;
mod user;

pub use user::{User, UserFilter, UserRepository, UserRole, UserStats, UserSummary};

pub use session::{Session, SessionRepository};

pub use category::{Category, CategoryRepository};

pub use product::{
    Product, ProductFilter, ProductRepository, ProductSortField, SortDirection,
    SHORT_DESCRIPTION_LEN,
};

pub use inventory::{
    AdjustmentResult, InventoryAdjustment, InventoryLevel, InventoryMovement,
    InventoryRepository, MovementType,
};

pub use cart::{
    generate_guest_id, Cart, CartItem, CartOwner, CartRepository, CartStatus, LineChange,
    LineQuantity,
};

pub use promotion::{
    Promotion, PromotionRejection, PromotionRepository, PromotionStats, PromotionType,
};

pub use order::{
    generate_order_no, Order, OrderDraft, OrderItem, OrderRepository, OrderStats, OrderStatus,
    PaymentStatus, ShippingAddress, StatusCount,
};

pub use payment::{
    IntentStatus, Payment, PaymentIntent, PaymentProvider, PaymentRepository, SettleOutcome,
};

pub use service_catalog::{
    PriceType, Service, ServiceItem, ServicePricing, ServiceRepository, ServiceStats,
    ServiceType, ServiceTypeRepository, Technician, TechnicianRepository,
    DEFAULT_DURATION_MINUTES,
};

pub use booking::{
    Booking, BookingItem, BookingRepository, BookingStatus, ServicePayment, ServicePaymentStatus,
};

pub use notification::{
    Notification, NotificationRepository, NotificationStats, NotificationType, PENDING_LIMIT,
};

#[cfg(test)]
pub use self::{
    booking::MockBookingRepository, cart::MockCartRepository, category::MockCategoryRepository,
    inventory::MockInventoryRepository, notification::MockNotificationRepository,
    order::MockOrderRepository, payment::MockPaymentRepository,
    product::MockProductRepository, promotion::MockPromotionRepository,
    service_catalog::{MockServiceRepository, MockServiceTypeRepository, MockTechnicianRepository},
    session::MockSessionRepository, user::MockUserRepository,
};
