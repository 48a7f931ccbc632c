//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! Each repository owns a clone of the pool. Operations that touch more than
//! one table (checkout, stock adjustments, cart reservations, payment
//! settlement) open their own transaction.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgCartRepository, PgOrderRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let carts = PgCartRepository::new(pool.clone());
//!     let orders = PgOrderRepository::new(pool);
//! }
//! ```

// Accounts
pub mod session_repository;
pub mod user_repository;

// Catalog and stock
pub mod category_repository;
pub mod inventory_repository;
pub mod product_repository;

// Shopping
pub mod cart_repository;
pub mod order_repository;
pub mod payment_repository;
pub mod promotion_repository;

// Services
pub mod booking_repository;
pub mod service_repository;
pub mod service_type_repository;
pub mod technician_repository;

pub mod notification_repository;

pub use booking_repository::PgBookingRepository;
pub use cart_repository::PgCartRepository;
pub use category_repository::PgCategoryRepository;
pub use inventory_repository::PgInventoryRepository;
pub use notification_repository::PgNotificationRepository;
pub use order_repository::PgOrderRepository;
pub use payment_repository::PgPaymentRepository;
pub use product_repository::PgProductRepository;
pub use promotion_repository::PgPromotionRepository;
pub use service_repository::PgServiceRepository;
pub use service_type_repository::PgServiceTypeRepository;
pub use session_repository::PgSessionRepository;
pub use technician_repository::PgTechnicianRepository;
pub use user_repository::PgUserRepository;
