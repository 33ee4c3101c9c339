//! Built-in availability report against a real PostgreSQL
//!
//! Seeds `kat`, `zimmer` and `hitstatistic` into a dedicated schema of the
//! database given by `DATABASE_URL`. Skipped when the variable is not set.

mod common;

use chrono::NaiveDate;
use common::test_pool;
use pms_reports::repos::{ExecutorError, PgQueryExecutor, QueryExecutor};
use pms_reports::services::{ReportEngine, ReportStrategy};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Double: 10 rooms, 5 sold each night of 2024-01-01..07 at 100.00 gross / 90.00 net.
/// Suite: 1 room, out of service every night.
/// Statistics outside the period, of other hotels or of other status codes are noise.
const SEED: &str = r#"
DROP TABLE IF EXISTS hitstatistic, zimmer, kat;

CREATE TABLE kat (
    katnr INT PRIMARY KEY,
    kat VARCHAR(50) NOT NULL,
    katpos INT NOT NULL,
    zimmer INT NOT NULL
);

CREATE TABLE zimmer (
    ziname VARCHAR(20) PRIMARY KEY,
    kat INT NOT NULL,
    mpehotel INT NOT NULL
);

CREATE TABLE hitstatistic (
    katnr INT NOT NULL,
    date DATE NOT NULL,
    occupancy INT NOT NULL,
    reschar INT NOT NULL,
    kattyp INT NOT NULL,
    mpehotel INT NOT NULL,
    stationid INT NOT NULL,
    logis NUMERIC(18, 2) NOT NULL,
    logisnet NUMERIC(18, 2) NOT NULL
);

INSERT INTO kat (katnr, kat, katpos, zimmer) VALUES
    (1, 'Double', 1, 1),
    (2, 'Suite', 2, 1),
    (3, 'Parking', 3, 0);

INSERT INTO zimmer (ziname, kat, mpehotel)
SELECT 'D' || n, 1, 1 FROM generate_series(1, 10) AS n;
INSERT INTO zimmer (ziname, kat, mpehotel) VALUES ('S1', 2, 1), ('X1', 1, 2), ('P1', 3, 1);

INSERT INTO hitstatistic (katnr, date, occupancy, reschar, kattyp, mpehotel, stationid, logis, logisnet)
SELECT 1, d::date, 5, 0, 0, 1, 1, 500.00, 450.00
FROM generate_series(DATE '2024-01-01', DATE '2024-01-07', INTERVAL '1 day') AS d;

INSERT INTO hitstatistic (katnr, date, occupancy, reschar, kattyp, mpehotel, stationid, logis, logisnet)
SELECT 2, d::date, 1, 6, 0, 1, 1, 0, 0
FROM generate_series(DATE '2024-01-01', DATE '2024-01-07', INTERVAL '1 day') AS d;

INSERT INTO hitstatistic (katnr, date, occupancy, reschar, kattyp, mpehotel, stationid, logis, logisnet) VALUES
    (1, DATE '2024-01-08', 9, 0, 0, 1, 1, 900.00, 800.00),
    (1, DATE '2024-01-03', 3, 2, 0, 1, 1, 300.00, 250.00),
    (1, DATE '2024-01-03', 4, 0, 0, 2, 1, 400.00, 350.00),
    (1, DATE '2024-01-03', 2, 0, 1, 1, 1, 200.00, 150.00);
"#;

async fn seeded_pool() -> Option<PgPool> {
    let Some(pool) = test_pool().await else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };
    sqlx::raw_sql(SEED)
        .execute(&pool)
        .await
        .expect("Failed to seed PMS tables");
    Some(pool)
}

fn engine(pool: PgPool) -> ReportEngine {
    ReportEngine::new(Arc::new(PgQueryExecutor::new(pool)), ReportStrategy::Builtin)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
#[serial]
async fn test_availability_week() {
    let Some(pool) = seeded_pool().await else {
        return;
    };

    let model = engine(pool)
        .generate_report("AVAIL", date(2024, 1, 1), date(2024, 1, 7), "0", "1")
        .await
        .unwrap();

    assert_eq!(model.title, "Availability Period Report");
    assert_eq!(
        model.column_names,
        vec!["Descr", "Capacity", "Availability", "Sold", "OccPst", "SoldPerc", "ADR", "RevPar"]
    );
    assert!(model.is_rectangular());
    assert_eq!(
        model.rows,
        vec![
            vec!["Room Type", "Capacity", "Avail.", "Sold", "Occ %", "Perc Sold%", "ADR", "RevPar"],
            vec!["Double (10)", "70", "35", "35", "50 %", "100 %", "100", "50"],
            vec!["Suite (1)", "0", "0", "0", "0 %", "0 %", "0", "0"],
            vec!["Totals", "70", "35", "35", "50 %", "", "100", "50"],
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_net_revenue() {
    let Some(pool) = seeded_pool().await else {
        return;
    };

    let model = engine(pool)
        .generate_report("AVAIL", date(2024, 1, 1), date(2024, 1, 7), "1", "1")
        .await
        .unwrap();

    assert_eq!(model.revenue_type, "Net");
    let totals = model.rows.last().unwrap();
    assert_eq!(totals[0], "Totals");
    assert_eq!(totals[6], "90");
    assert_eq!(totals[7], "45");
}

#[tokio::test]
#[serial]
async fn test_totals_are_sums_of_categories() {
    let Some(pool) = seeded_pool().await else {
        return;
    };

    let model = engine(pool)
        .generate_report("AVAIL", date(2024, 1, 2), date(2024, 1, 4), "0", "0")
        .await
        .unwrap();

    let categories: Vec<&Vec<String>> = model.rows[1..model.rows.len() - 1].iter().collect();
    let totals = model.rows.last().unwrap();
    for column in 1..=3 {
        let sum: i64 = categories
            .iter()
            .map(|row| row[column].parse::<i64>().unwrap())
            .sum();
        assert_eq!(totals[column], sum.to_string(), "column {column}");
    }
    assert_eq!(totals[1], "30");
    assert_eq!(totals[3], "15");
}

#[tokio::test]
#[serial]
async fn test_executor_returns_first_result_set_only() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let result = PgQueryExecutor::new(pool)
        .execute_query(
            "CREATE TEMP TABLE IF NOT EXISTS t_exec (v INT); \
             SELECT 1 AS a, NULL::text AS b; \
             SELECT 2 AS c;",
        )
        .await
        .unwrap();

    assert_eq!(result.column_names(), ["a", "b"]);
    assert_eq!(result.rows(), [vec!["1".to_string(), String::new()]]);
}

#[tokio::test]
#[serial]
async fn test_executor_reports_columns_of_empty_result() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let result = PgQueryExecutor::new(pool)
        .execute_query("SELECT 1 AS a, 'x'::text AS b WHERE false")
        .await
        .unwrap();

    assert_eq!(result.column_names(), ["a", "b"]);
    assert!(result.rows().is_empty());
}

#[tokio::test]
#[serial]
async fn test_executor_empty_first_result_set_wins() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let result = PgQueryExecutor::new(pool)
        .execute_query("SELECT 1 AS a WHERE false; SELECT 2 AS other;")
        .await
        .unwrap();

    assert_eq!(result.column_names(), ["a"]);
    assert!(result.rows().is_empty());
}

#[tokio::test]
#[serial]
async fn test_timed_out_query_stops_on_server() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let executor = PgQueryExecutor::new(pool.clone()).with_timeout(Duration::from_secs(1));
    let err = executor
        .execute_query("SELECT pg_sleep(20) AS executor_timeout_marker")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::Timeout { seconds: 1 }));

    let mut still_running = i64::MAX;
    for _ in 0..20 {
        still_running = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pg_stat_activity \
             WHERE query LIKE '%executor_timeout_marker%' \
               AND state = 'active' \
               AND pid <> pg_backend_pid()",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        if still_running == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(still_running, 0, "timed out query is still running");
}
