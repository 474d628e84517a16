//! A benchmark session: one connection to one database file, opened with
//! foreign-key enforcement on and released on `close` or drop.

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::index::IndexSet;
use crate::query::{BenchQuery, ViewDef};
use crate::schema::toggle::{disable_keys, restore_keys, set_foreign_keys};
use crate::schema::{detect_state, SchemaState};

/// Where trial postal codes come from.
#[derive(Debug)]
pub enum PostalCodeSampler {
    /// `ORDER BY RANDOM() LIMIT 1`, not reproducible.
    Engine,
    /// Uniform row offset drawn from a seeded RNG.
    Seeded(StdRng),
}

/// Outcome of one query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial {
    pub postal_code: i64,
    pub count: i64,
}

/// A batch of trials under one wall-clock measurement.
#[derive(Debug, Clone)]
pub struct TrialRun {
    pub elapsed: Duration,
    pub trials: Vec<Trial>,
}

pub struct BenchSession {
    conn: Connection,
    sampler: PostalCodeSampler,
}

impl BenchSession {
    /// Open an existing database file. A missing file is an error rather
    /// than an empty new database.
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let session = Self::from_connection(conn)?;

        match session.schema_state()? {
            SchemaState::Keyed => {}
            SchemaState::Unkeyed => warn!(
                "{} has keys disabled from an earlier run; it must be rebuilt",
                path.display()
            ),
            SchemaState::Inconsistent { reason } => {
                warn!("{} is in an inconsistent state: {reason}", path.display())
            }
        }
        Ok(session)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    /// Wrap an already-open connection and switch foreign keys on.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        set_foreign_keys(&conn, true)?;
        Ok(Self {
            conn,
            sampler: PostalCodeSampler::Engine,
        })
    }

    /// Draw postal codes from a seeded RNG instead of the engine's `RANDOM()`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler = PostalCodeSampler::Seeded(StdRng::seed_from_u64(seed));
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn schema_state(&self) -> Result<SchemaState> {
        detect_state(&self.conn)
    }

    pub fn set_automatic_index(&self, enabled: bool) -> Result<()> {
        debug!("PRAGMA automatic_index = {enabled}");
        self.conn
            .pragma_update(None, "automatic_index", enabled)
            .context("failed to set automatic_index")
    }

    pub fn automatic_index(&self) -> Result<bool> {
        let v: i64 = self
            .conn
            .pragma_query_value(None, "automatic_index", |row| row.get(0))
            .context("failed to read automatic_index")?;
        Ok(v != 0)
    }

    pub fn disable_keys(&self) -> Result<()> {
        disable_keys(&self.conn)
    }

    pub fn restore_keys(&self) -> Result<()> {
        restore_keys(&self.conn)
    }

    pub fn create_indexes(&self, set: &IndexSet) -> Result<()> {
        set.create(&self.conn)
    }

    pub fn drop_indexes(&self, set: &IndexSet) -> Result<()> {
        set.drop_all(&self.conn)
    }

    pub fn create_view(&self, view: &ViewDef) -> Result<()> {
        view.create(&self.conn)
    }

    pub fn drop_view(&self, view: &ViewDef) -> Result<()> {
        view.drop_view(&self.conn)
    }

    /// A postal code of a uniformly chosen customer row.
    pub fn random_postal_code(&mut self) -> Result<i64> {
        let code: Option<i64> = match &mut self.sampler {
            PostalCodeSampler::Engine => self
                .conn
                .query_row(
                    "SELECT customer_postal_code FROM Customers ORDER BY RANDOM() LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to sample a postal code")?,
            PostalCodeSampler::Seeded(rng) => {
                let rows: i64 = self
                    .conn
                    .query_row("SELECT COUNT(*) FROM Customers", [], |row| row.get(0))
                    .context("failed to count customers")?;
                if rows == 0 {
                    None
                } else {
                    let offset = rng.gen_range(0..rows);
                    self.conn
                        .query_row(
                            "SELECT customer_postal_code FROM Customers LIMIT 1 OFFSET ?1",
                            [offset],
                            |row| row.get(0),
                        )
                        .optional()
                        .context("failed to sample a postal code")?
                }
            }
        };
        match code {
            Some(code) => Ok(code),
            None => bail!("Customers table is empty, no postal code to sample"),
        }
    }

    /// Run the query once with a freshly drawn postal code.
    pub fn run_trial(&mut self, query: &BenchQuery) -> Result<Trial> {
        let postal_code = self.random_postal_code()?;
        let mut stmt = self
            .conn
            .prepare_cached(query.sql)
            .with_context(|| format!("failed to prepare {}", query.name))?;
        let count: i64 = stmt
            .query_row([postal_code], |row| row.get(0))
            .with_context(|| format!("{} failed for postal code {postal_code}", query.name))?;
        Ok(Trial { postal_code, count })
    }

    /// Run `trials` trials inside one wall-clock measurement.
    pub fn time_trials(&mut self, query: &BenchQuery, trials: u32) -> Result<TrialRun> {
        let mut results = Vec::with_capacity(trials as usize);
        let start = Instant::now();
        for _ in 0..trials {
            results.push(self.run_trial(query)?);
        }
        Ok(TrialRun {
            elapsed: start.elapsed(),
            trials: results,
        })
    }

    /// Close the connection, surfacing any error the engine reports.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("failed to close database")
    }
}
