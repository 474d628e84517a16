//! Data population: samples the source CSVs into per-tier datasets and
//! writes them into keyed SQLite files.
//!
//! Also generates synthetic Olist-shaped data for tests and benches.

use anyhow::{Context, Result};
use log::info;
use olist_core::types::{Customer, Order, OrderItem, Seller};
use olist_core::Tier;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection, Transaction};
use std::collections::HashSet;
use std::path::Path;

use crate::query::ALL_QUERIES;
use crate::schema::{self, SchemaVariant};
use crate::source::SourceData;

/// Rows destined for one database file.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub customers: Vec<Customer>,
    pub sellers: Vec<Seller>,
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
}

/// Keep each row independently with probability `rate`. One draw per row,
/// whether kept or not, so the RNG stream depends only on the row count.
pub fn sample_rows<T: Clone>(rows: &[T], rate: f64, rng: &mut StdRng) -> Vec<T> {
    rows.iter()
        .filter(|_| rng.gen::<f64>() < rate)
        .cloned()
        .collect()
}

/// Orders of sampled customers, then items whose order and seller both made
/// it in.
pub fn derive_dataset(
    source: &SourceData,
    customers: Vec<Customer>,
    sellers: Vec<Seller>,
) -> Dataset {
    let customer_ids: HashSet<&str> = customers.iter().map(|c| c.customer_id.as_str()).collect();
    let seller_ids: HashSet<&str> = sellers.iter().map(|s| s.seller_id.as_str()).collect();

    let orders: Vec<Order> = source
        .orders
        .iter()
        .filter(|o| customer_ids.contains(o.customer_id.as_str()))
        .cloned()
        .collect();
    let order_ids: HashSet<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();

    let items = source
        .items
        .iter()
        .filter(|i| {
            order_ids.contains(i.order_id.as_str()) && seller_ids.contains(i.seller_id.as_str())
        })
        .cloned()
        .collect();

    Dataset {
        customers,
        sellers,
        orders,
        items,
    }
}

/// Sample every requested tier from one seeded stream.
///
/// The stream is consumed for all tiers in [`Tier::ALL`] order (customers,
/// then sellers) even when only some are requested, so a tier's contents do
/// not depend on which other tiers are built alongside it.
pub fn sample_tiers(source: &SourceData, tiers: &[Tier], seed: u64) -> Vec<(Tier, Dataset)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(tiers.len());
    for tier in Tier::ALL {
        let customers = sample_rows(&source.customers, tier.customer_rate(), &mut rng);
        let sellers = sample_rows(&source.sellers, tier.seller_rate(), &mut rng);
        if tiers.contains(&tier) {
            out.push((tier, derive_dataset(source, customers, sellers)));
        }
    }
    out
}

/// Bulk-insert a dataset into already-created tables, parents first.
pub fn insert_dataset(tx: &Transaction, data: &Dataset) -> Result<()> {
    let mut stmt =
        tx.prepare("INSERT INTO Customers (customer_id, customer_postal_code) VALUES (?1, ?2)")?;
    for c in &data.customers {
        stmt.execute(params![c.customer_id, c.postal_code])
            .with_context(|| format!("failed to insert customer {}", c.customer_id))?;
    }

    let mut stmt =
        tx.prepare("INSERT INTO Sellers (seller_id, seller_postal_code) VALUES (?1, ?2)")?;
    for s in &data.sellers {
        stmt.execute(params![s.seller_id, s.postal_code])
            .with_context(|| format!("failed to insert seller {}", s.seller_id))?;
    }

    let mut stmt = tx.prepare("INSERT INTO Orders (order_id, customer_id) VALUES (?1, ?2)")?;
    for o in &data.orders {
        stmt.execute(params![o.order_id, o.customer_id])
            .with_context(|| format!("failed to insert order {}", o.order_id))?;
    }

    let mut stmt = tx.prepare(
        "INSERT INTO Order_items (order_id, order_item_id, product_id, seller_id)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for i in &data.items {
        stmt.execute(params![i.order_id, i.order_item_id, i.product_id, i.seller_id])
            .with_context(|| {
                format!(
                    "failed to insert item {}#{} of order {}",
                    i.product_id, i.order_item_id, i.order_id
                )
            })?;
    }
    Ok(())
}

/// Clear out everything the harness may have left behind, recreate the
/// keyed tables and load `data`, all on one connection with FKs enforced.
pub fn populate(conn: &mut Connection, data: &Dataset) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .context("failed to enable foreign_keys")?;

    let tx = conn.transaction()?;
    for query in ALL_QUERIES {
        if let Some(view) = &query.view {
            view.drop_view(&tx)?;
        }
    }
    schema::drop_tables(&tx)?;
    schema::create_tables(&tx, SchemaVariant::Keyed)?;
    insert_dataset(&tx, data)?;
    tx.commit().context("failed to commit population")?;
    Ok(())
}

/// Build one tier database file from scratch.
pub fn build_database(path: &Path, data: &Dataset) -> Result<()> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    populate(&mut conn, data)
        .with_context(|| format!("failed to populate {}", path.display()))?;
    conn.close()
        .map_err(|(_, e)| e)
        .with_context(|| format!("failed to close {}", path.display()))?;
    info!(
        "built {}: {} customers, {} sellers, {} orders, {} items",
        path.display(),
        data.customers.len(),
        data.sellers.len(),
        data.orders.len(),
        data.items.len()
    );
    Ok(())
}

/// Size of a synthetic dataset.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticParams {
    pub customers: usize,
    pub sellers: usize,
    pub orders: usize,
    /// Items per order are drawn from `1..=max_items_per_order`.
    pub max_items_per_order: usize,
    /// Number of distinct postal codes customers are spread over.
    pub postal_codes: usize,
}

impl SyntheticParams {
    /// Small enough for unit tests.
    pub fn tiny() -> Self {
        Self {
            customers: 200,
            sellers: 20,
            orders: 260,
            max_items_per_order: 4,
            postal_codes: 25,
        }
    }

    /// Roughly the shape of the small tier.
    pub fn standard() -> Self {
        Self {
            customers: 10_000,
            sellers: 500,
            orders: 10_000,
            max_items_per_order: 5,
            postal_codes: 1_500,
        }
    }
}

/// Generate a referentially consistent dataset.
///
/// Uses a fixed seed for deterministic, reproducible benchmarks.
pub fn generate_synthetic(params: &SyntheticParams) -> Dataset {
    let mut rng = StdRng::seed_from_u64(0x0715_7A3D_B00C_0001);
    let postal_codes = params.postal_codes.max(1) as i64;

    let customers: Vec<Customer> = (0..params.customers)
        .map(|i| Customer {
            customer_id: format!("cust_{i:06}"),
            postal_code: 1_000 + rng.gen_range(0..postal_codes),
        })
        .collect();

    let sellers: Vec<Seller> = (0..params.sellers)
        .map(|i| Seller {
            seller_id: format!("sell_{i:05}"),
            postal_code: 1_000 + rng.gen_range(0..postal_codes),
        })
        .collect();

    let mut orders = Vec::with_capacity(params.orders);
    let mut items = Vec::new();
    if customers.is_empty() {
        return Dataset {
            customers,
            sellers,
            orders,
            items,
        };
    }

    for i in 0..params.orders {
        let order_id = format!("order_{i:07}");
        let customer = &customers[rng.gen_range(0..customers.len())];
        orders.push(Order {
            order_id: order_id.clone(),
            customer_id: customer.customer_id.clone(),
        });

        if sellers.is_empty() {
            continue;
        }
        let n_items = rng.gen_range(1..=params.max_items_per_order.max(1));
        for item_no in 1..=n_items {
            items.push(OrderItem {
                order_id: order_id.clone(),
                order_item_id: item_no as i64,
                product_id: format!("prod_{:05}", rng.gen_range(0..5_000)),
                seller_id: sellers[rng.gen_range(0..sellers.len())].seller_id.clone(),
            });
        }
    }

    Dataset {
        customers,
        sellers,
        orders,
        items,
    }
}
