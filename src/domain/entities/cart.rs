//! Shopping cart entities and repository trait.
//!
//! A cart belongs either to a registered user or to a guest identified by a
//! generated `guest_id`. Every unit sitting in an ACTIVE cart is reserved in
//! inventory; the repository keeps the two in step.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartStatus {
    #[default]
    Active,
    CheckedOut,
    Abandoned,
}

impl CartStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "CHECKED_OUT" => Self::CheckedOut,
            "ABANDONED" => Self::Abandoned,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::CheckedOut => "CHECKED_OUT",
            Self::Abandoned => "ABANDONED",
        }
    }
}

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

/// Maps to the `carts` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub guest_id: Option<String>,
    pub status: CartStatus,
    /// Only guest carts expire.
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: Some(user_id),
            guest_id: None,
            status: CartStatus::Active,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_guest(ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            guest_id: Some(generate_guest_id()),
            status: CartStatus::Active,
            expires_at: Some(now + Duration::days(ttl_days)),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// `guest_<unix millis>_<9 base36 chars>`
pub fn generate_guest_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("guest_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// A cart line joined with the product fields shown in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    /// Price captured when the line was first added
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * i64::from(self.quantity)
    }
}

/// How a line's quantity should change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineQuantity {
    /// Add to whatever the line already holds.
    Add(i32),
    /// Replace the quantity; zero or less removes the line.
    Set(i32),
}

impl LineQuantity {
    /// Resulting quantity given the current one (0 when the line is absent).
    pub fn resolve(&self, current: i32) -> i32 {
        match *self {
            LineQuantity::Add(n) => current + n,
            LineQuantity::Set(n) => n.max(0),
        }
    }
}

/// Result of changing a line inside the reservation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    Applied { previous: i32, current: i32 },
    /// Not enough unreserved stock; nothing was changed.
    InsufficientStock { available: i32 },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The ACTIVE cart for an owner, if any.
    async fn find_active(&self, owner: &CartOwner) -> Result<Option<Cart>, AppError>;

    async fn create(&self, cart: &Cart) -> Result<Cart, AppError>;

    async fn items(&self, cart_id: Uuid) -> Result<Vec<CartItem>, AppError>;

    /// Change a line and reserve or release the difference in inventory,
    /// atomically. `unit_price` is used only when the line is created.
    async fn change_line(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: LineQuantity,
        unit_price: i64,
    ) -> Result<LineChange, AppError>;

    /// Delete a line and release its reservation. Returns false when absent.
    async fn remove_line(&self, cart_id: Uuid, product_id: Uuid) -> Result<bool, AppError>;

    /// Delete every line and release the reservations.
    async fn clear(&self, cart_id: Uuid) -> Result<(), AppError>;

    /// Move all lines of `source` into `target` (summing quantities) and delete `source`.
    async fn merge_into(&self, source: Uuid, target: Uuid) -> Result<(), AppError>;

    /// Hand a guest cart over to a user.
    async fn assign_to_user(&self, cart_id: Uuid, user_id: Uuid) -> Result<Cart, AppError>;

    /// Mark expired ACTIVE guest carts ABANDONED and release their
    /// reservations. Returns the number of carts abandoned.
    async fn abandon_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
