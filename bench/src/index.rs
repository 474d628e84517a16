//! Named secondary indexes for the user-optimized regime.
//!
//! Indexes attach to whatever tables currently carry the names, so callers
//! restore keys before creating them.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;

use crate::schema::object_exists;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub table: &'static str,
    pub column: &'static str,
}

impl IndexDef {
    pub const fn new(name: &'static str, table: &'static str, column: &'static str) -> Self {
        Self {
            name,
            table,
            column,
        }
    }
}

/// A fixed set of indexes created and dropped together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSet {
    pub indexes: &'static [IndexDef],
}

/// Indexes for the multi-item order count.
pub const MULTI_ITEM_INDEXES: IndexSet = IndexSet {
    indexes: &[
        IndexDef::new("customer_idIdx", "Customers", "customer_id"),
        IndexDef::new(
            "customer_postal_codeIdx",
            "Customers",
            "customer_postal_code",
        ),
        IndexDef::new("order_idIdx", "Orders", "order_id"),
    ],
};

/// Indexes for the above-average order size count.
pub const ABOVE_AVERAGE_INDEXES: IndexSet = IndexSet {
    indexes: &[
        IndexDef::new(
            "customer_postal_codeIdx",
            "Customers",
            "customer_postal_code",
        ),
        IndexDef::new("c_customer_idIdx", "Customers", "customer_id"),
        IndexDef::new("o_customer_idIdx", "Orders", "customer_id"),
        IndexDef::new("o_order_idIdx", "Orders", "order_id"),
    ],
};

impl IndexSet {
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.indexes.iter().map(|i| i.name)
    }

    /// Create every index in the set. An index that already exists is an
    /// error: it means an earlier run did not clean up.
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for idx in self.indexes {
            debug!("creating index {} on {}({})", idx.name, idx.table, idx.column);
            conn.execute_batch(&format!(
                "CREATE INDEX {} ON {} ({});",
                idx.name, idx.table, idx.column
            ))
            .with_context(|| format!("failed to create index {}", idx.name))?;
        }
        Ok(())
    }

    /// Drop every index of the set that exists. Missing ones are skipped.
    pub fn drop_all(&self, conn: &Connection) -> Result<()> {
        for idx in self.indexes {
            if !object_exists(conn, "index", idx.name)? {
                debug!("index {} not present, skipping", idx.name);
                continue;
            }
            debug!("dropping index {}", idx.name);
            conn.execute_batch(&format!("DROP INDEX IF EXISTS {};", idx.name))
                .with_context(|| format!("failed to drop index {}", idx.name))?;
        }
        Ok(())
    }
}

/// Names of all indexes in the catalog that were not created by a PRIMARY KEY
/// or UNIQUE constraint, sorted.
pub fn user_indexes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'index' AND name NOT LIKE 'sqlite_autoindex_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .context("failed to list indexes")?;
    Ok(names)
}
