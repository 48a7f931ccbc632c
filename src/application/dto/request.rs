//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    BookingStatus, InventoryAdjustment, NotificationType, OrderStatus, PriceType,
    ProductFilter, ProductSortField, PromotionType, ServicePaymentStatus, ShippingAddress,
    SortDirection, UserFilter, UserRole,
};
use crate::shared::pagination::PageRequest;
use crate::shared::validation::{validate_password_strength, validate_vn_phone};

// ----------------------------------------------------------------------------
// Auth
// ----------------------------------------------------------------------------

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(
        length(min = 8, max = 128, message = "Password must be 8-128 characters"),
        custom(function = validate_password_strength)
    )]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,

    #[validate(custom(function = validate_vn_phone))]
    pub phone: Option<String>,
}

/// Refresh and logout request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(
        length(min = 8, max = 128, message = "Password must be 8-128 characters"),
        custom(function = validate_password_strength)
    )]
    pub new_password: String,
}

// ----------------------------------------------------------------------------
// Users (admin)
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl UserListQuery {
    pub fn into_filter(self) -> UserFilter {
        UserFilter {
            search: self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            role: self.role,
            page: PageRequest::new(self.page, self.page_size),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: Option<String>,

    #[validate(custom(function = validate_vn_phone))]
    pub phone: Option<String>,

    pub role: Option<UserRole>,
}

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub featured: Option<bool>,
    pub sort_by: Option<ProductSortField>,
    pub order: Option<SortDirection>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ProductListQuery {
    pub fn into_filter(self) -> ProductFilter {
        ProductFilter {
            q: self.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
            category_id: self.category_id,
            min_price: self.min_price,
            max_price: self.max_price,
            featured: self.featured,
            sort_by: self.sort_by.unwrap_or_default(),
            order: self.order.unwrap_or_default(),
            page: PageRequest::new(self.page, self.page_size),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 200, message = "Slug must be 1-200 characters"))]
    pub slug: Option<String>,

    #[validate(length(min = 1, max = 64, message = "SKU must be 1-64 characters"))]
    pub sku: Option<String>,

    pub category_id: Option<Uuid>,
    pub description: Option<String>,

    #[validate(length(max = 500, message = "Short description must be at most 500 characters"))]
    pub short_description: Option<String>,

    #[validate(range(min = 1, message = "Price must be greater than 0"))]
    pub price: i64,

    #[validate(range(min = 0, message = "Original price cannot be negative"))]
    pub original_price: Option<i64>,

    #[serde(default)]
    pub images: Vec<String>,

    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub meta_title: Option<String>,

    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    pub initial_stock: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Slug must be 1-200 characters"))]
    pub slug: Option<String>,

    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub short_description: Option<String>,

    #[validate(range(min = 1, message = "Price must be greater than 0"))]
    pub price: Option<i64>,

    #[validate(range(min = 0, message = "Original price cannot be negative"))]
    pub original_price: Option<i64>,

    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub meta_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Slug must be 1-100 characters"))]
    pub slug: Option<String>,

    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Slug must be 1-100 characters"))]
    pub slug: Option<String>,

    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

// ----------------------------------------------------------------------------
// Inventory
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct InventoryListQuery {
    pub low_stock_only: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdjustInventoryRequest {
    pub stock: Option<i32>,
    pub stock_delta: Option<i32>,
    pub reserved: Option<i32>,
    pub reserved_delta: Option<i32>,
    pub low_stock_threshold: Option<i32>,

    #[validate(length(max = 255, message = "Reason must be at most 255 characters"))]
    pub reason: Option<String>,

    pub reference: Option<String>,
}

impl From<AdjustInventoryRequest> for InventoryAdjustment {
    fn from(req: AdjustInventoryRequest) -> Self {
        InventoryAdjustment {
            stock: req.stock,
            stock_delta: req.stock_delta,
            reserved: req.reserved,
            reserved_delta: req.reserved_delta,
            low_stock_threshold: req.low_stock_threshold,
            reason: req.reason,
            reference_id: req.reference,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<i64>,
}

// ----------------------------------------------------------------------------
// Cart
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, max = 999, message = "Quantity must be 1-999"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    /// Zero or less removes the line.
    #[validate(range(max = 999, message = "Quantity must be at most 999"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergeCartRequest {
    #[validate(length(min = 1, message = "Guest id is required"))]
    pub guest_id: String,
}

// ----------------------------------------------------------------------------
// Promotions
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ValidatePromotionRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1-50 characters"))]
    pub code: String,

    #[validate(range(
        min = 0,
        max = 1_000_000_000_000i64,
        message = "Order amount must be between 0 and 1,000,000,000,000"
    ))]
    pub order_amount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromotionListQuery {
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1-50 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub description: Option<String>,
    pub promo_type: PromotionType,

    #[validate(range(min = 0, message = "Value cannot be negative"))]
    pub value: i64,

    #[validate(range(min = 0, message = "Minimum order amount cannot be negative"))]
    pub min_order_amount: Option<i64>,

    #[validate(range(min = 0, message = "Maximum discount cannot be negative"))]
    pub max_discount: Option<i64>,

    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub usage_limit: Option<i32>,

    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePromotionRequest {
    #[validate(length(min = 1, max = 50, message = "Code must be 1-50 characters"))]
    pub code: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
    pub promo_type: Option<PromotionType>,

    #[validate(range(min = 0, message = "Value cannot be negative"))]
    pub value: Option<i64>,

    pub min_order_amount: Option<i64>,
    pub max_discount: Option<i64>,
    pub usage_limit: Option<i32>,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

// ----------------------------------------------------------------------------
// Checkout and orders
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, max = 255, message = "Address must be 1-255 characters"))]
    pub address: String,

    pub ward: Option<String>,
    pub district: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City must be 1-100 characters"))]
    pub city: String,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(req: ShippingAddressRequest) -> Self {
        ShippingAddress {
            address: req.address.trim().to_string(),
            ward: req.ward.filter(|w| !w.trim().is_empty()),
            district: req.district.filter(|d| !d.trim().is_empty()),
            city: req.city.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    /// Required when the caller is not signed in.
    pub guest_id: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Customer name must be 1-100 characters"))]
    pub customer_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: String,

    #[validate(custom(function = validate_vn_phone))]
    pub customer_phone: String,

    #[validate(nested)]
    pub shipping_address: ShippingAddressRequest,

    pub promotion_code: Option<String>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,

    #[validate(nested)]
    pub shipping_address: Option<ShippingAddressRequest>,
}

// ----------------------------------------------------------------------------
// Payments
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentIntentRequest {
    pub order_id: Uuid,

    #[validate(length(min = 1, message = "Provider is required"))]
    pub provider: String,

    #[validate(url(message = "Return URL must be a valid URL"))]
    pub return_url: String,
}

// ----------------------------------------------------------------------------
// Services and technicians
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceTypeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateServiceTypeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceListQuery {
    pub type_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceRequest {
    pub type_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub description: Option<String>,
    pub price_type: Option<PriceType>,

    #[validate(range(min = 0, message = "Base price cannot be negative"))]
    pub base_price: Option<i64>,

    #[validate(range(min = 0, message = "Minimum price cannot be negative"))]
    pub min_price: Option<i64>,

    #[validate(range(min = 0, message = "Maximum price cannot be negative"))]
    pub max_price: Option<i64>,

    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration_minutes: Option<i32>,

    #[serde(default)]
    pub images: Vec<String>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateServiceRequest {
    pub type_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
    pub price_type: Option<PriceType>,
    pub base_price: Option<i64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,

    #[validate(range(min = 1, message = "Duration must be at least one minute"))]
    pub duration_minutes: Option<i32>,

    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateServiceItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateServiceItemRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: Option<i64>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTechnicianRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = validate_vn_phone))]
    pub phone: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TechnicianListQuery {
    pub active_only: Option<bool>,
}

// ----------------------------------------------------------------------------
// Bookings
// ----------------------------------------------------------------------------

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingItemRequest {
    pub service_item_id: Uuid,

    #[serde(default = "one")]
    #[validate(range(min = 1, max = 99, message = "Quantity must be 1-99"))]
    pub quantity: i32,
}

/// Used by both signed-in and guest bookings; guests must give a name and phone.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub service_id: Uuid,

    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<BookingItemRequest>,

    pub technician_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,

    #[validate(length(min = 1, max = 100, message = "Customer name must be 1-100 characters"))]
    pub customer_name: Option<String>,

    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,

    #[validate(range(min = 0, message = "Estimated costs cannot be negative"))]
    pub estimated_costs: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    pub technician_id: Option<Uuid>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Customer name must be 1-100 characters"))]
    pub customer_name: Option<String>,

    #[validate(custom(function = validate_vn_phone))]
    pub customer_phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub customer_email: Option<String>,

    pub address: Option<String>,
    pub notes: Option<String>,

    #[validate(range(min = 0, message = "Estimated costs cannot be negative"))]
    pub estimated_costs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignTechnicianRequest {
    pub technician_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateServicePaymentRequest {
    #[validate(length(min = 1, max = 32, message = "Provider must be 1-32 characters"))]
    pub provider: Option<String>,

    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServicePaymentRequest {
    pub status: ServicePaymentStatus,
}

// ----------------------------------------------------------------------------
// Notifications
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    pub read: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    pub notification_type: NotificationType,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,

    pub data: Option<serde_json::Value>,
}
