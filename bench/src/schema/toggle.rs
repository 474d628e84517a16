//! Key toggling: swap the four tables between the keyed and unkeyed variant.
//!
//! Disabling first saves the file's own `CREATE` text for the four tables and
//! everything attached to them (indexes, triggers) into `pk_saved_schema`,
//! then parks each keyed table under its `pk_` backup name and fills an
//! unkeyed replacement. Restoring drops the unkeyed copies, replays the saved
//! table DDL, refills the tables from the backups, drops the backups and
//! replays the saved indexes and triggers. Replaying the saved text instead
//! of renaming back keeps `sqlite_master` byte-identical: SQLite rewrites a
//! renamed table's CREATE text with a quoted identifier.
//!
//! Each direction runs in a single transaction. Foreign-key enforcement can
//! only be switched outside a transaction, so it is flipped before/after.

use anyhow::{bail, Context, Result};
use log::debug;
use rusqlite::Connection;

use super::{detect_state, SchemaState, SAVED_SCHEMA, TABLES};

pub fn set_foreign_keys(conn: &Connection, enabled: bool) -> Result<()> {
    debug!("PRAGMA foreign_keys = {}", on_off(enabled));
    conn.pragma_update(None, "foreign_keys", enabled)
        .context("failed to set foreign_keys")
}

pub fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    let v: i64 = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .context("failed to read foreign_keys")?;
    Ok(v != 0)
}

/// Drop PK/FK constraints from all four tables, keeping every row.
///
/// Fails without touching anything unless the database is in the keyed state;
/// a leftover `pk_` table means an earlier run died between disable and
/// restore and the file must be rebuilt.
pub fn disable_keys(conn: &Connection) -> Result<()> {
    match detect_state(conn)? {
        SchemaState::Keyed => {}
        SchemaState::Unkeyed => bail!(
            "keys are already disabled (backup tables pk_* exist); \
             a previous run did not restore them, rebuild the database"
        ),
        SchemaState::Inconsistent { reason } => bail!(
            "cannot disable keys, database is inconsistent: {reason}; rebuild it from the CSVs"
        ),
    }

    // Must precede the renames: some engines refuse to rename an FK target.
    set_foreign_keys(conn, false)?;

    // Keep view bodies and FK clauses pointing at the original names, so the
    // OrderSize view reads the unkeyed copy while keys are off.
    conn.pragma_update(None, "legacy_alter_table", true)
        .context("failed to enable legacy_alter_table")?;
    let result = swap_in_unkeyed(conn);
    conn.pragma_update(None, "legacy_alter_table", false)
        .context("failed to disable legacy_alter_table")?;
    result
}

/// `'Customers', 'Sellers', ...` for use in an `IN (...)` list.
fn table_name_list() -> String {
    TABLES
        .iter()
        .map(|t| format!("'{}'", t.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn swap_in_unkeyed(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(&format!(
        "CREATE TABLE {SAVED_SCHEMA} (
             position INTEGER PRIMARY KEY,
             kind TEXT NOT NULL,
             name TEXT NOT NULL,
             sql TEXT NOT NULL
         );"
    ))
    .context("failed to create saved schema table")?;
    // Tables first, then attached objects in creation order.
    let saved = tx
        .execute(
            &format!(
                "INSERT INTO {SAVED_SCHEMA} (kind, name, sql)
                 SELECT type, name, sql FROM sqlite_master
                 WHERE tbl_name IN ({}) AND type IN ('table', 'index', 'trigger')
                 AND sql IS NOT NULL
                 ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, rowid",
                table_name_list()
            ),
            [],
        )
        .context("failed to save table definitions")?;
    debug!("saved {saved} schema entries to {SAVED_SCHEMA}");

    for table in TABLES {
        let backup = table.backup_name();
        debug!("renaming {} to {backup}", table.name);
        tx.execute_batch(&format!("ALTER TABLE {} RENAME TO {backup};", table.name))
            .with_context(|| format!("failed to rename {} to {backup}", table.name))?;
    }
    for table in TABLES {
        tx.execute_batch(table.unkeyed_ddl)
            .with_context(|| format!("failed to create unkeyed {}", table.name))?;
        let columns = table.column_list();
        let copied = tx
            .execute(
                &format!(
                    "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
                    table.name,
                    table.backup_name()
                ),
                [],
            )
            .with_context(|| format!("failed to copy rows into unkeyed {}", table.name))?;
        debug!("copied {copied} rows into unkeyed {}", table.name);
    }
    tx.commit().context("failed to commit key removal")?;
    Ok(())
}

/// One `CREATE` statement saved by [`disable_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct SavedEntry {
    kind: String,
    name: String,
    sql: String,
}

fn load_saved_schema(conn: &Connection) -> Result<Vec<SavedEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT kind, name, sql FROM {SAVED_SCHEMA} ORDER BY position"
    ))?;
    let entries = stmt
        .query_map([], |row| {
            Ok(SavedEntry {
                kind: row.get(0)?,
                name: row.get(1)?,
                sql: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {SAVED_SCHEMA}"))?;
    Ok(entries)
}

/// Bring back the keyed tables and re-enable foreign-key enforcement.
///
/// After the swap the referential invariants are checked once with
/// `PRAGMA foreign_key_check`; any violation is an error.
pub fn restore_keys(conn: &Connection) -> Result<()> {
    match detect_state(conn)? {
        SchemaState::Unkeyed => {}
        SchemaState::Keyed => bail!("keys are not disabled, nothing to restore"),
        SchemaState::Inconsistent { reason } => bail!(
            "cannot restore keys, database is inconsistent: {reason}; rebuild it from the CSVs"
        ),
    }

    let saved = load_saved_schema(conn)?;
    let mut table_sql = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        match saved.iter().find(|e| e.kind == "table" && e.name == table.name) {
            Some(entry) => table_sql.push(entry.sql.as_str()),
            None => bail!(
                "{SAVED_SCHEMA} has no definition for {}; rebuild the database",
                table.name
            ),
        }
    }

    set_foreign_keys(conn, false)?;

    let tx = conn.unchecked_transaction()?;
    for table in TABLES.iter().rev() {
        tx.execute_batch(&format!("DROP TABLE {};", table.name))
            .with_context(|| format!("failed to drop unkeyed {}", table.name))?;
    }
    for (table, sql) in TABLES.iter().zip(table_sql) {
        tx.execute_batch(sql)
            .with_context(|| format!("failed to recreate keyed {}", table.name))?;
        let columns = table.column_list();
        let restored = tx
            .execute(
                &format!(
                    "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
                    table.name,
                    table.backup_name()
                ),
                [],
            )
            .with_context(|| format!("failed to restore rows of {}", table.name))?;
        debug!("restored {restored} rows into keyed {}", table.name);
    }
    // Backups take their copies of the indexes and triggers with them.
    for table in TABLES.iter().rev() {
        tx.execute_batch(&format!("DROP TABLE {};", table.backup_name()))
            .with_context(|| format!("failed to drop backup {}", table.backup_name()))?;
    }
    for entry in saved.iter().filter(|e| e.kind != "table") {
        debug!("recreating {} {}", entry.kind, entry.name);
        tx.execute_batch(&entry.sql)
            .with_context(|| format!("failed to recreate {} {}", entry.kind, entry.name))?;
    }
    tx.execute_batch(&format!("DROP TABLE {SAVED_SCHEMA};"))
        .context("failed to drop saved schema table")?;
    tx.commit().context("failed to commit key restore")?;

    set_foreign_keys(conn, true)?;
    check_foreign_keys(conn)
}

/// Fail if any row violates a declared foreign key.
pub fn check_foreign_keys(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let violations = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("foreign_key_check failed")?;
    if let Some((table, parent)) = violations.first() {
        bail!(
            "{} foreign key violation(s), first in {table} referencing {parent}",
            violations.len()
        );
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "ON" } else { "OFF" }
}
