//! HTML message bodies for staff alerts.

use crate::domain::{Booking, Order, OrderItem};

/// Items listed before the message switches to "and N more".
const LISTED_ITEMS: usize = 3;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `1234567` -> `1.234.567 ₫`
pub fn format_vnd(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} ₫")
}

pub fn order_message(order: &Order, items: &[OrderItem]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(LISTED_ITEMS)
        .map(|item| format!("  • {} x{}", escape_html(&item.product_name), item.quantity))
        .collect();
    if items.is_empty() {
        lines.push("  (không có sản phẩm)".to_string());
    }
    if items.len() > LISTED_ITEMS {
        lines.push(format!("  ... và {} sản phẩm khác", items.len() - LISTED_ITEMS));
    }

    let address = &order.shipping_address;
    let full_address = [
        Some(address.address.as_str()),
        address.ward.as_deref(),
        address.district.as_deref(),
        Some(address.city.as_str()),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        "🆕 <b>ĐƠN HÀNG MỚI #{}</b>\n\n\
         👤 Khách hàng: {}\n\
         📧 Email: {}\n\
         📱 SĐT: {}\n\n\
         💰 Tổng tiền: {}\n\
         📦 Sản phẩm:\n{}\n\n\
         📍 Địa chỉ: {}",
        escape_html(&order.order_no),
        escape_html(&order.customer_name),
        escape_html(&order.customer_email),
        escape_html(&order.customer_phone),
        format_vnd(order.total),
        lines.join("\n"),
        escape_html(&full_address),
    )
}

pub fn booking_message(booking: &Booking, service_name: &str) -> String {
    let or_na = |value: &Option<String>| {
        value
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "N/A".to_string())
    };

    format!(
        "🔧 <b>LỊCH DỊCH VỤ MỚI</b>\n\n\
         🛠 Dịch vụ: {}\n\
         📅 Thời gian: {} {}\n\
         👤 Khách hàng: {}\n\
         📱 SĐT: {}\n\
         📍 Địa chỉ: {}\n\
         💰 Dự kiến: {}",
        escape_html(service_name),
        booking.scheduled_date.format("%d/%m/%Y"),
        escape_html(&booking.scheduled_time),
        or_na(&booking.customer_name),
        or_na(&booking.customer_phone),
        or_na(&booking.address),
        format_vnd(booking.estimated_costs),
    )
}
