//! Order pricing domain service.
//!
//! Used by the cart for estimates and by checkout for the final amounts, so
//! both always agree on shipping and totals.

use serde::Serialize;

use crate::config::ShopSettings;
use crate::domain::entities::CartItem;

/// Shipping fee and free-shipping threshold, in VND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub shipping_fee: i64,
    pub free_shipping_threshold: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: 50_000,
            free_shipping_threshold: 10_000_000,
        }
    }
}

impl From<&ShopSettings> for PricingPolicy {
    fn from(shop: &ShopSettings) -> Self {
        Self {
            shipping_fee: shop.shipping_fee,
            free_shipping_threshold: shop.free_shipping_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping: i64,
    pub total: i64,
}

impl PricingPolicy {
    pub fn subtotal(items: &[CartItem]) -> i64 {
        items.iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(items: &[CartItem]) -> i64 {
        items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    pub fn shipping_for(&self, subtotal: i64, free_shipping_promotion: bool) -> i64 {
        if free_shipping_promotion || subtotal >= self.free_shipping_threshold {
            0
        } else {
            self.shipping_fee
        }
    }

    /// `total = subtotal - discount + shipping`, floored at zero.
    pub fn quote(&self, subtotal: i64, discount: i64, free_shipping_promotion: bool) -> PriceQuote {
        let shipping = self.shipping_for(subtotal, free_shipping_promotion);
        PriceQuote {
            subtotal,
            discount,
            shipping,
            total: (subtotal - discount + shipping).max(0),
        }
    }
}
