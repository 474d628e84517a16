//! The analytical queries that get timed, with the view and index set each
//! one needs.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;

use crate::index::{IndexSet, ABOVE_AVERAGE_INDEXES, MULTI_ITEM_INDEXES};
use crate::schema::object_exists;

/// A derived view that must exist while its query is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDef {
    pub name: &'static str,
    pub select: &'static str,
}

/// Item count per order.
pub const ORDER_SIZE_VIEW: ViewDef = ViewDef {
    name: "OrderSize",
    select: "SELECT order_id AS oid, COUNT(*) AS size
             FROM Order_items
             GROUP BY oid",
};

impl ViewDef {
    /// No-op if the view is already present.
    pub fn create(&self, conn: &Connection) -> Result<()> {
        debug!("creating view {}", self.name);
        conn.execute_batch(&format!(
            "CREATE VIEW IF NOT EXISTS {} AS {};",
            self.name, self.select
        ))
        .with_context(|| format!("failed to create view {}", self.name))
    }

    pub fn drop_view(&self, conn: &Connection) -> Result<()> {
        debug!("dropping view {}", self.name);
        conn.execute_batch(&format!("DROP VIEW IF EXISTS {};", self.name))
            .with_context(|| format!("failed to drop view {}", self.name))
    }

    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        object_exists(conn, "view", self.name)
    }
}

/// One timed query: SQL taking the postal code as `?1` and returning a single
/// count, plus the view and indexes that go with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
    pub view: Option<ViewDef>,
    pub indexes: IndexSet,
}

/// Orders placed from the postal code that contain more than one item.
pub const MULTI_ITEM_ORDERS: BenchQuery = BenchQuery {
    name: "multi_item_orders",
    description: "orders with more than one item for customers in a postal code",
    sql: "SELECT COUNT(*)
          FROM Orders o, Customers c
          WHERE customer_postal_code = ?1
          AND c.customer_id = o.customer_id
          AND o.order_id IN
              (SELECT order_id
               FROM Order_items
               GROUP BY order_id
               HAVING COUNT(*) > 1)",
    view: None,
    indexes: MULTI_ITEM_INDEXES,
};

/// Orders placed from the postal code whose size beats the mean order size.
pub const ABOVE_AVERAGE_ORDERS: BenchQuery = BenchQuery {
    name: "above_average_orders",
    description: "orders larger than the average order for customers in a postal code",
    sql: "SELECT COUNT(*)
          FROM Customers c, Orders o, OrderSize s
          WHERE customer_postal_code = ?1
          AND c.customer_id = o.customer_id
          AND o.order_id = s.oid
          AND size >
              (SELECT AVG(size)
               FROM OrderSize)",
    view: Some(ORDER_SIZE_VIEW),
    indexes: ABOVE_AVERAGE_INDEXES,
};

pub const ALL_QUERIES: [BenchQuery; 2] = [MULTI_ITEM_ORDERS, ABOVE_AVERAGE_ORDERS];

impl BenchQuery {
    pub fn by_name(name: &str) -> Option<BenchQuery> {
        let name = match name.trim() {
            "q1" | "Q1" => MULTI_ITEM_ORDERS.name,
            "q2" | "Q2" => ABOVE_AVERAGE_ORDERS.name,
            other => other,
        };
        ALL_QUERIES
            .into_iter()
            .find(|q| q.name.eq_ignore_ascii_case(name))
    }
}
