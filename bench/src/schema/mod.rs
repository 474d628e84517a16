//! Table definitions and schema-state inspection.
//!
//! Every table has two definitions held side by side: the keyed one the
//! builder creates, and an unkeyed one with the same columns but no primary
//! key, foreign key or uniqueness constraint. [`toggle`] swaps between them.

pub mod toggle;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Prefix of the backup name a keyed table is moved to while keys are off.
pub const BACKUP_PREFIX: &str = "pk_";

/// Holds the original `CREATE` text of the tables and their indexes while
/// keys are off.
pub const SAVED_SCHEMA: &str = "pk_saved_schema";

/// Prefix older tooling renamed unkeyed copies to before dropping them.
pub const STALE_PREFIX: &str = "nopk_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    Keyed,
    Unkeyed,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub keyed_ddl: &'static str,
    pub unkeyed_ddl: &'static str,
}

impl TableDef {
    pub fn ddl(&self, variant: SchemaVariant) -> &'static str {
        match variant {
            SchemaVariant::Keyed => self.keyed_ddl,
            SchemaVariant::Unkeyed => self.unkeyed_ddl,
        }
    }

    pub fn backup_name(&self) -> String {
        format!("{BACKUP_PREFIX}{}", self.name)
    }

    pub fn stale_name(&self) -> String {
        format!("{STALE_PREFIX}{}", self.name)
    }

    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }
}

pub const CUSTOMERS: TableDef = TableDef {
    name: "Customers",
    columns: &["customer_id", "customer_postal_code"],
    keyed_ddl: "CREATE TABLE Customers (
                customer_id TEXT,
                customer_postal_code INTEGER,
                PRIMARY KEY(customer_id)
            )",
    unkeyed_ddl: "CREATE TABLE Customers (
                customer_id TEXT,
                customer_postal_code INTEGER
            )",
};

pub const SELLERS: TableDef = TableDef {
    name: "Sellers",
    columns: &["seller_id", "seller_postal_code"],
    keyed_ddl: "CREATE TABLE Sellers (
                seller_id TEXT,
                seller_postal_code INTEGER,
                PRIMARY KEY(seller_id)
            )",
    unkeyed_ddl: "CREATE TABLE Sellers (
                seller_id TEXT,
                seller_postal_code INTEGER
            )",
};

pub const ORDERS: TableDef = TableDef {
    name: "Orders",
    columns: &["order_id", "customer_id"],
    keyed_ddl: "CREATE TABLE Orders (
                order_id TEXT,
                customer_id TEXT,
                PRIMARY KEY(order_id),
                FOREIGN KEY(customer_id) REFERENCES Customers(customer_id)
            )",
    unkeyed_ddl: "CREATE TABLE Orders (
                order_id TEXT,
                customer_id TEXT
            )",
};

pub const ORDER_ITEMS: TableDef = TableDef {
    name: "Order_items",
    columns: &["order_id", "order_item_id", "product_id", "seller_id"],
    keyed_ddl: "CREATE TABLE Order_items (
                order_id TEXT,
                order_item_id INTEGER,
                product_id TEXT,
                seller_id TEXT,
                PRIMARY KEY(order_id, order_item_id, product_id, seller_id),
                FOREIGN KEY(seller_id) REFERENCES Sellers(seller_id),
                FOREIGN KEY(order_id) REFERENCES Orders(order_id)
            )",
    unkeyed_ddl: "CREATE TABLE Order_items (
                order_id TEXT,
                order_item_id INTEGER,
                product_id TEXT,
                seller_id TEXT
            )",
};

/// Parents before children.
pub const TABLES: [TableDef; 4] = [CUSTOMERS, SELLERS, ORDERS, ORDER_ITEMS];

/// What the harness finds in a database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaState {
    /// All four tables present under their own names, no backups.
    Keyed,
    /// Keys disabled: unkeyed copies live under the original names, every
    /// keyed table is parked under its backup name and the saved schema is
    /// present.
    Unkeyed,
    /// Anything else. The file has to be rebuilt.
    Inconsistent { reason: String },
}

/// Create all four tables in the given variant.
pub fn create_tables(conn: &Connection, variant: SchemaVariant) -> Result<()> {
    for table in TABLES {
        conn.execute_batch(table.ddl(variant))
            .with_context(|| format!("failed to create table {}", table.name))?;
    }
    Ok(())
}

/// Drop the four tables plus any leftovers of an interrupted key toggle.
pub fn drop_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {SAVED_SCHEMA};"))
        .context("failed to drop saved schema table")?;
    for table in TABLES.iter().rev() {
        for name in [
            table.name.to_string(),
            table.backup_name(),
            table.stale_name(),
        ] {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {name};"))
                .with_context(|| format!("failed to drop table {name}"))?;
        }
    }
    Ok(())
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    object_exists(conn, "table", name)
}

pub(crate) fn object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to look up {kind} {name}"))?;
    Ok(count > 0)
}

/// Whether the live table under `name` declares a primary key.
fn has_primary_key(conn: &Connection, name: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({name})"))?;
    let pk_columns = stmt
        .query_map([], |row| row.get::<_, i64>(5))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(pk_columns.iter().any(|&pk| pk > 0))
}

/// Classify the database by which of the original and backup tables exist.
pub fn detect_state(conn: &Connection) -> Result<SchemaState> {
    let mut originals = Vec::with_capacity(TABLES.len());
    let mut backups = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        originals.push(table_exists(conn, table.name)?);
        backups.push(table_exists(conn, &table.backup_name())?);
    }

    if let Some(missing) = TABLES
        .iter()
        .zip(&originals)
        .find(|(_, &present)| !present)
        .map(|(t, _)| t.name)
    {
        return Ok(SchemaState::Inconsistent {
            reason: format!("table {missing} is missing"),
        });
    }

    let saved = table_exists(conn, SAVED_SCHEMA)?;
    if backups.iter().all(|&b| b) {
        if !saved {
            return Ok(SchemaState::Inconsistent {
                reason: format!("backup tables exist but {SAVED_SCHEMA} is missing"),
            });
        }
        return Ok(SchemaState::Unkeyed);
    }
    if let Some(orphan) = TABLES
        .iter()
        .zip(&backups)
        .find(|(_, &present)| present)
        .map(|(t, _)| t.backup_name())
    {
        return Ok(SchemaState::Inconsistent {
            reason: format!("orphaned backup table {orphan} without a full set"),
        });
    }

    if saved {
        return Ok(SchemaState::Inconsistent {
            reason: format!("orphaned {SAVED_SCHEMA} without backup tables"),
        });
    }

    for table in TABLES {
        if !has_primary_key(conn, table.name)? {
            return Ok(SchemaState::Inconsistent {
                reason: format!("table {} has no primary key and no backup", table.name),
            });
        }
    }
    Ok(SchemaState::Keyed)
}

/// One row of `sqlite_master`, minus the root page (which moves on rewrite).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub kind: String,
    pub name: String,
    pub tbl_name: String,
    pub sql: Option<String>,
}

/// Full catalog, ordered by type then name.
pub fn schema_snapshot(conn: &Connection) -> Result<Vec<SchemaEntry>> {
    let mut stmt =
        conn.prepare("SELECT type, name, tbl_name, sql FROM sqlite_master ORDER BY type, name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SchemaEntry {
                kind: row.get(0)?,
                name: row.get(1)?,
                tbl_name: row.get(2)?,
                sql: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read sqlite_master")?;
    Ok(rows)
}

/// Row count of every table, in [`TABLES`] order.
pub fn row_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    TABLES
        .iter()
        .map(|t| {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", t.name), [], |row| row.get(0))
                .with_context(|| format!("failed to count rows of {}", t.name))?;
            Ok((t.name, n))
        })
        .collect()
}
