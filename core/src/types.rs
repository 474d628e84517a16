//! Row types for the four Olist tables.
//!
//! Field names follow the CSV headers so the records deserialize directly
//! with `serde`; unknown CSV columns are ignored.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    #[serde(rename = "customer_zip_code_prefix")]
    pub postal_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Seller {
    pub seller_id: String,
    #[serde(rename = "seller_zip_code_prefix")]
    pub postal_code: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
}

/// One line of an order. Identity is the full
/// `(order_id, order_item_id, product_id, seller_id)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    pub order_item_id: i64,
    pub product_id: String,
    pub seller_id: String,
}
