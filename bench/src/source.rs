//! Loading the four Olist CSV extracts.

use anyhow::{Context, Result};
use olist_core::types::{Customer, Order, OrderItem, Seller};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const CUSTOMERS_CSV: &str = "olist_customers_dataset.csv";
pub const SELLERS_CSV: &str = "olist_sellers_dataset.csv";
pub const ORDERS_CSV: &str = "olist_orders_dataset.csv";
pub const ORDER_ITEMS_CSV: &str = "olist_order_items_dataset.csv";

/// Every row of the four source files, in file order.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub customers: Vec<Customer>,
    pub sellers: Vec<Seller>,
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
}

impl SourceData {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            customers: read_records(&dir.join(CUSTOMERS_CSV))?,
            sellers: read_records(&dir.join(SELLERS_CSV))?,
            orders: read_records(&dir.join(ORDERS_CSV))?,
            items: read_records(&dir.join(ORDER_ITEMS_CSV))?,
        })
    }
}

/// Deserialize a headed CSV file by column name; extra columns are ignored.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, record)| {
            // Line numbers are 1-based and the header is line 1.
            record.with_context(|| format!("{}: bad record on line {}", path.display(), i + 2))
        })
        .collect()
}
