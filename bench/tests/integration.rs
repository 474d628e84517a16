//! Integration tests: key toggling, index and view lifecycle, trial sampling
//! and the regime runner against synthetic data.

use olist_bench::index::{user_indexes, ABOVE_AVERAGE_INDEXES, MULTI_ITEM_INDEXES};
use olist_bench::populate::{
    build_database, generate_synthetic, insert_dataset, populate, Dataset, SyntheticParams,
};
use olist_bench::query::{
    BenchQuery, ABOVE_AVERAGE_ORDERS, ALL_QUERIES, MULTI_ITEM_ORDERS, ORDER_SIZE_VIEW,
};
use olist_bench::runner::{run_matrix, run_regime, run_regime_on, RunOptions};
use olist_bench::schema::toggle::{disable_keys, foreign_keys_enabled, restore_keys};
use olist_bench::schema::{
    detect_state, row_counts, schema_snapshot, table_exists, SchemaState, SAVED_SCHEMA,
};
use olist_bench::session::BenchSession;
use olist_core::{Regime, Tier};
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn setup_session(params: &SyntheticParams) -> (BenchSession, Dataset) {
    let data = generate_synthetic(params);
    let mut session = BenchSession::open_in_memory().expect("open");
    populate(session.connection_mut(), &data).expect("populate");
    (session, data)
}

fn customer_postal_codes(data: &Dataset) -> HashSet<i64> {
    data.customers.iter().map(|c| c.postal_code).collect()
}

fn items_per_order(data: &Dataset) -> HashMap<&str, usize> {
    let mut sizes = HashMap::new();
    for item in &data.items {
        *sizes.entry(item.order_id.as_str()).or_insert(0) += 1;
    }
    sizes
}

fn orders_in_postal_code<'a>(data: &'a Dataset, code: i64) -> Vec<&'a str> {
    let customers: HashSet<&str> = data
        .customers
        .iter()
        .filter(|c| c.postal_code == code)
        .map(|c| c.customer_id.as_str())
        .collect();
    data.orders
        .iter()
        .filter(|o| customers.contains(o.customer_id.as_str()))
        .map(|o| o.order_id.as_str())
        .collect()
}

fn expected_multi_item(data: &Dataset, code: i64) -> i64 {
    let sizes = items_per_order(data);
    orders_in_postal_code(data, code)
        .into_iter()
        .filter(|o| sizes.get(o).copied().unwrap_or(0) > 1)
        .count() as i64
}

fn expected_above_average(data: &Dataset, code: i64) -> i64 {
    let sizes = items_per_order(data);
    let avg = sizes.values().sum::<usize>() as f64 / sizes.len() as f64;
    orders_in_postal_code(data, code)
        .into_iter()
        .filter(|o| sizes.get(o).map_or(false, |&n| n as f64 > avg))
        .count() as i64
}

// ── Schema toggler ──────────────────────────────────────────────────

#[test]
fn key_round_trip_preserves_schema_text() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    let before = schema_snapshot(conn).unwrap();
    disable_keys(conn).unwrap();
    assert_ne!(schema_snapshot(conn).unwrap(), before);
    restore_keys(conn).unwrap();

    assert_eq!(schema_snapshot(conn).unwrap(), before);
    assert_eq!(detect_state(conn).unwrap(), SchemaState::Keyed);
}

#[test]
fn key_round_trip_preserves_row_counts() {
    let (session, data) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    let before = row_counts(conn).unwrap();
    assert_eq!(before[0], ("Customers", data.customers.len() as i64));
    assert_eq!(before[3], ("Order_items", data.items.len() as i64));

    disable_keys(conn).unwrap();
    assert_eq!(row_counts(conn).unwrap(), before);
    restore_keys(conn).unwrap();
    assert_eq!(row_counts(conn).unwrap(), before);
}

#[test]
fn keyed_schema_rejects_dangling_order() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    assert!(foreign_keys_enabled(conn).unwrap());
    let err = conn.execute(
        "INSERT INTO Orders (order_id, customer_id) VALUES ('o-x', 'no-such-customer')",
        [],
    );
    assert!(err.is_err(), "FK violation should be rejected");
}

#[test]
fn unkeyed_schema_accepts_duplicates_and_dangling_rows() {
    let (session, data) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    disable_keys(conn).unwrap();
    assert!(!foreign_keys_enabled(conn).unwrap());
    assert_eq!(detect_state(conn).unwrap(), SchemaState::Unkeyed);

    let dup = &data.customers[0];
    conn.execute(
        "INSERT INTO Customers (customer_id, customer_postal_code) VALUES (?1, ?2)",
        rusqlite::params![dup.customer_id, dup.postal_code],
    )
    .expect("duplicate id accepted without PK");
    conn.execute(
        "INSERT INTO Orders (order_id, customer_id) VALUES ('o-x', 'no-such-customer')",
        [],
    )
    .expect("dangling FK accepted without keys");

    // Keyed tables are parked under their backup names.
    for name in ["pk_Customers", "pk_Sellers", "pk_Orders", "pk_Order_items"] {
        assert!(table_exists(conn, name).unwrap(), "{name} missing");
    }
}

#[test]
fn restore_rejects_rows_violating_foreign_keys() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    disable_keys(conn).unwrap();
    // Only the backups are copied back, so this must go into the backup.
    conn.execute(
        "INSERT INTO pk_Orders (order_id, customer_id) VALUES ('o-x', 'no-such-customer')",
        [],
    )
    .unwrap();

    let err = restore_keys(conn).unwrap_err();
    assert!(
        format!("{err:#}").contains("foreign key violation"),
        "{err:#}"
    );
}

#[test]
fn disabling_twice_fails_loudly() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    disable_keys(conn).unwrap();
    let err = disable_keys(conn).unwrap_err();
    assert!(format!("{err}").contains("already disabled"), "{err}");

    // The failed attempt changed nothing.
    assert_eq!(detect_state(conn).unwrap(), SchemaState::Unkeyed);
    restore_keys(conn).unwrap();
    assert_eq!(detect_state(conn).unwrap(), SchemaState::Keyed);
}

#[test]
fn orphaned_backup_table_is_detected() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    conn.execute_batch("CREATE TABLE pk_Customers (customer_id TEXT);").unwrap();

    let state = detect_state(conn).unwrap();
    assert!(
        matches!(state, SchemaState::Inconsistent { .. }),
        "{state:?}"
    );
    let err = disable_keys(conn).unwrap_err();
    assert!(format!("{err}").contains("rebuild"), "{err}");
    assert!(!table_exists(conn, "pk_Sellers").unwrap());
}

#[test]
fn missing_saved_schema_blocks_restore() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();

    disable_keys(conn).unwrap();
    assert!(table_exists(conn, SAVED_SCHEMA).unwrap());
    conn.execute_batch(&format!("DROP TABLE {SAVED_SCHEMA};")).unwrap();

    let state = detect_state(conn).unwrap();
    assert!(
        matches!(state, SchemaState::Inconsistent { .. }),
        "{state:?}"
    );
    let err = restore_keys(conn).unwrap_err();
    assert!(format!("{err}").contains("rebuild"), "{err}");
}

/// Tables as another tool writes them: its own spacing, column-level keys
/// and a quoted name.
const HAND_WRITTEN_DDL: &str = "
CREATE TABLE Customers(customer_id TEXT PRIMARY KEY, customer_postal_code INTEGER);
CREATE TABLE Sellers (
                                seller_id TEXT,
                                seller_postal_code INTEGER,
                                PRIMARY KEY(seller_id)
                    );
CREATE TABLE Orders ( order_id TEXT, customer_id TEXT,
    PRIMARY KEY (order_id),
    FOREIGN KEY (customer_id) REFERENCES Customers (customer_id) );
CREATE TABLE \"Order_items\" (order_id TEXT, order_item_id INTEGER,
    product_id TEXT, seller_id TEXT,
    PRIMARY KEY(order_id, order_item_id, product_id, seller_id),
    FOREIGN KEY(seller_id) REFERENCES Sellers(seller_id),
    FOREIGN KEY(order_id) REFERENCES Orders(order_id));
";

fn setup_hand_written_session() -> BenchSession {
    let data = generate_synthetic(&SyntheticParams::tiny());
    let mut session = BenchSession::open_in_memory().unwrap();
    let conn = session.connection_mut();
    conn.execute_batch(HAND_WRITTEN_DDL).unwrap();
    let tx = conn.transaction().unwrap();
    insert_dataset(&tx, &data).unwrap();
    tx.commit().unwrap();
    session
}

#[test]
fn round_trip_keeps_table_text_it_did_not_write() {
    let session = setup_hand_written_session();
    let conn = session.connection();
    assert_eq!(detect_state(conn).unwrap(), SchemaState::Keyed);

    let before = schema_snapshot(conn).unwrap();
    let counts = row_counts(conn).unwrap();
    disable_keys(conn).unwrap();
    restore_keys(conn).unwrap();

    assert_eq!(schema_snapshot(conn).unwrap(), before);
    assert_eq!(row_counts(conn).unwrap(), counts);
    assert!(!table_exists(conn, SAVED_SCHEMA).unwrap());
}

#[test]
fn round_trip_keeps_indexes_on_keyed_tables() {
    let session = setup_hand_written_session();
    let conn = session.connection();
    conn.execute_batch(
        "CREATE INDEX keep_me ON Orders(customer_id);
         CREATE INDEX partial_codes ON Customers(customer_postal_code)
             WHERE customer_postal_code > 1010;",
    )
    .unwrap();

    let before = schema_snapshot(conn).unwrap();
    disable_keys(conn).unwrap();
    restore_keys(conn).unwrap();

    assert_eq!(schema_snapshot(conn).unwrap(), before);
    assert_eq!(
        user_indexes(conn).unwrap(),
        vec!["keep_me".to_string(), "partial_codes".to_string()]
    );
}

#[test]
fn restore_without_disable_fails() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let err = restore_keys(session.connection()).unwrap_err();
    assert!(format!("{err}").contains("not disabled"), "{err}");
}

#[test]
fn view_reads_unkeyed_copy_while_keys_are_off() {
    let (session, data) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();
    session.create_view(&ORDER_SIZE_VIEW).unwrap();

    let view_sql = |conn: &rusqlite::Connection| -> String {
        conn.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'view' AND name = 'OrderSize'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    };
    let original_sql = view_sql(conn);
    let count_view = |conn: &rusqlite::Connection| -> i64 {
        conn.query_row("SELECT COUNT(*) FROM OrderSize", [], |row| row.get(0))
            .unwrap()
    };
    let before = count_view(conn);

    disable_keys(conn).unwrap();
    assert_eq!(view_sql(conn), original_sql);
    conn.execute(
        "INSERT INTO Order_items VALUES ('brand-new-order', 1, 'p', ?1)",
        [&data.sellers[0].seller_id],
    )
    .unwrap();
    assert_eq!(count_view(conn), before + 1);

    restore_keys(conn).unwrap();
    assert_eq!(view_sql(conn), original_sql);
    assert_eq!(count_view(conn), before);
}

// ── Index manager ───────────────────────────────────────────────────

#[test]
fn dropping_absent_indexes_is_a_noop() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let before = schema_snapshot(session.connection()).unwrap();

    session.drop_indexes(&ABOVE_AVERAGE_INDEXES).unwrap();
    session.drop_indexes(&MULTI_ITEM_INDEXES).unwrap();

    assert_eq!(schema_snapshot(session.connection()).unwrap(), before);
}

#[test]
fn create_then_drop_restores_index_catalog() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    let conn = session.connection();
    let before = schema_snapshot(conn).unwrap();
    assert!(user_indexes(conn).unwrap().is_empty());

    for set in [MULTI_ITEM_INDEXES, ABOVE_AVERAGE_INDEXES] {
        session.create_indexes(&set).unwrap();
        let mut expected: Vec<String> = set.names().map(str::to_string).collect();
        expected.sort();
        assert_eq!(user_indexes(conn).unwrap(), expected);

        session.drop_indexes(&set).unwrap();
        assert_eq!(schema_snapshot(conn).unwrap(), before);
    }
}

#[test]
fn creating_an_existing_index_fails() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    session.create_indexes(&MULTI_ITEM_INDEXES).unwrap();
    assert!(session.create_indexes(&MULTI_ITEM_INDEXES).is_err());
    session.drop_indexes(&MULTI_ITEM_INDEXES).unwrap();
}

#[test]
fn indexes_follow_the_active_variant() {
    let (session, _) = setup_session(&SyntheticParams::tiny());
    session.disable_keys().unwrap();
    session.create_indexes(&ABOVE_AVERAGE_INDEXES).unwrap();
    let on_unkeyed: String = session
        .connection()
        .query_row(
            "SELECT tbl_name FROM sqlite_master WHERE name = 'o_order_idIdx'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(on_unkeyed, "Orders");

    // The unkeyed tables go away on restore, taking their indexes with them.
    session.restore_keys().unwrap();
    assert!(user_indexes(session.connection()).unwrap().is_empty());
}

// ── Session / sampling ──────────────────────────────────────────────

#[test]
fn seeded_postal_codes_are_reproducible() {
    let params = SyntheticParams::tiny();
    let (a, data) = setup_session(&params);
    let (b, _) = setup_session(&params);
    let mut a = a.with_seed(42);
    let mut b = b.with_seed(42);

    let codes_a: Vec<i64> = (0..30).map(|_| a.random_postal_code().unwrap()).collect();
    let codes_b: Vec<i64> = (0..30).map(|_| b.random_postal_code().unwrap()).collect();
    assert_eq!(codes_a, codes_b);

    let valid = customer_postal_codes(&data);
    assert!(codes_a.iter().all(|c| valid.contains(c)));
    let distinct: HashSet<_> = codes_a.iter().collect();
    assert!(distinct.len() > 1, "codes should vary between trials");
}

#[test]
fn engine_postal_codes_vary_and_come_from_customers() {
    let (mut session, data) = setup_session(&SyntheticParams::tiny());
    let valid = customer_postal_codes(&data);
    assert!(valid.len() > 10);

    let codes: Vec<i64> = (0..50)
        .map(|_| session.random_postal_code().unwrap())
        .collect();
    for code in &codes {
        assert!(valid.contains(code), "{code} not a customer postal code");
    }
    let distinct: HashSet<_> = codes.iter().collect();
    assert!(distinct.len() > 1, "codes should vary between trials");
}

#[test]
fn sampling_from_empty_customers_fails() {
    let params = SyntheticParams {
        customers: 0,
        sellers: 0,
        orders: 0,
        max_items_per_order: 1,
        postal_codes: 1,
    };
    let (mut session, _) = setup_session(&params);
    let err = session.random_postal_code().unwrap_err();
    assert!(format!("{err}").contains("empty"), "{err}");
}

#[test]
fn trial_counts_match_expected_values() {
    let (session, data) = setup_session(&SyntheticParams::tiny());
    let mut session = session.with_seed(3);
    session.create_view(&ORDER_SIZE_VIEW).unwrap();

    for _ in 0..20 {
        let t = session.run_trial(&MULTI_ITEM_ORDERS).unwrap();
        assert_eq!(t.count, expected_multi_item(&data, t.postal_code));
        let t = session.run_trial(&ABOVE_AVERAGE_ORDERS).unwrap();
        assert_eq!(t.count, expected_above_average(&data, t.postal_code));
    }
}

// ── Runner ──────────────────────────────────────────────────────────

#[test]
fn uninformed_run_returns_valid_count_for_every_trial() {
    let (mut session, data) = setup_session(&SyntheticParams::tiny());
    let valid = customer_postal_codes(&data);

    for query in ALL_QUERIES {
        let r = run_regime_on(&mut session, Tier::Small, Regime::Uninformed, &query, 50).unwrap();
        assert_eq!(r.trial_count(), 50);
        assert!(r.trials.iter().all(|t| t.count >= 0));
        assert!(r.postal_codes().all(|c| valid.contains(&c)));
        assert!(!session.automatic_index().unwrap());
        assert_eq!(session.schema_state().unwrap(), SchemaState::Keyed);
    }
}

#[test]
fn regimes_leave_expected_state_behind() {
    let (mut session, _) = setup_session(&SyntheticParams::tiny());
    let before = row_counts(session.connection()).unwrap();
    let q = ABOVE_AVERAGE_ORDERS;

    run_regime_on(&mut session, Tier::Small, Regime::Uninformed, &q, 5).unwrap();
    assert!(ORDER_SIZE_VIEW.exists(session.connection()).unwrap());

    run_regime_on(&mut session, Tier::Small, Regime::SelfOptimized, &q, 5).unwrap();
    assert!(session.automatic_index().unwrap());
    assert!(ORDER_SIZE_VIEW.exists(session.connection()).unwrap());

    run_regime_on(&mut session, Tier::Small, Regime::UserOptimized, &q, 5).unwrap();
    assert!(!session.automatic_index().unwrap());
    assert!(!ORDER_SIZE_VIEW.exists(session.connection()).unwrap());
    assert!(user_indexes(session.connection()).unwrap().is_empty());

    assert_eq!(row_counts(session.connection()).unwrap(), before);
    assert_eq!(session.schema_state().unwrap(), SchemaState::Keyed);
}

#[test]
fn regimes_agree_on_results_for_the_same_codes() {
    let data = generate_synthetic(&SyntheticParams::tiny());
    let query = ABOVE_AVERAGE_ORDERS;
    let mut counts = Vec::new();
    for regime in Regime::ALL {
        let mut session = BenchSession::open_in_memory().unwrap().with_seed(11);
        populate(session.connection_mut(), &data).unwrap();
        let r = run_regime_on(&mut session, Tier::Small, regime, &query, 10).unwrap();
        counts.push(r.trials);
    }
    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[1], counts[2]);
}

#[test]
fn failing_query_still_restores_keys() {
    let (mut session, _) = setup_session(&SyntheticParams::tiny());
    let broken = BenchQuery {
        name: "broken",
        description: "references a missing table",
        sql: "SELECT COUNT(*) FROM NoSuchTable WHERE x = ?1",
        view: None,
        indexes: MULTI_ITEM_INDEXES,
    };

    let result = run_regime_on(&mut session, Tier::Small, Regime::Uninformed, &broken, 3);
    assert!(result.is_err());
    assert_eq!(session.schema_state().unwrap(), SchemaState::Keyed);

    let result = run_regime_on(&mut session, Tier::Small, Regime::UserOptimized, &broken, 3);
    assert!(result.is_err());
    assert!(user_indexes(session.connection()).unwrap().is_empty());
}

#[test]
fn matrix_over_tier_files() {
    let dir = TempDir::new().unwrap();
    let data = generate_synthetic(&SyntheticParams::tiny());
    build_database(&Tier::Small.db_path(dir.path()), &data).unwrap();

    let schema_before = {
        let s = BenchSession::open(&Tier::Small.db_path(dir.path())).unwrap();
        schema_snapshot(s.connection()).unwrap()
    };

    let options = RunOptions {
        trials: 5,
        seed: Some(9),
    };
    for query in ALL_QUERIES {
        let report = run_matrix(dir.path(), &[Tier::Small], &query, &options).unwrap();
        assert_eq!(report.query, query.name);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.tiers(), vec![Tier::Small]);
        for regime in Regime::ALL {
            let r = report.get(Tier::Small, regime).unwrap();
            assert_eq!(r.trial_count(), 5);
            assert!(r.mean_secs() >= 0.0);
        }
    }

    let s = BenchSession::open(&Tier::Small.db_path(dir.path())).unwrap();
    assert_eq!(schema_snapshot(s.connection()).unwrap(), schema_before);
}

#[test]
fn missing_tier_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = Tier::Medium.db_path(dir.path());
    let err = run_regime(
        &path,
        Tier::Medium,
        Regime::SelfOptimized,
        &MULTI_ITEM_ORDERS,
        &RunOptions::default(),
    );
    assert!(err.is_err());
    assert!(!path.exists(), "opening must not create the file");
}
