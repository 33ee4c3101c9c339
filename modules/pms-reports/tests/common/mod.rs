//! Common test utilities for report tests
//!
//! - `ScriptedExecutor`: in-memory `QueryExecutor` that records every SQL text
//!   and answers with a scripted outcome
//! - `test_pool`: per-test pool for the database suite, `None` when
//!   `DATABASE_URL` is not set
//! - HTTP helpers for router tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use pms_reports::metrics::Metrics;
use pms_reports::repos::{ExecutorError, QueryExecutor, QueryResult};
use pms_reports::routes::{self, metrics::MetricsState, ReportsState};
use pms_reports::services::ReportEngine;
use pms_reports::store::ReportStore;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome a `ScriptedExecutor` returns for every query
#[derive(Clone)]
pub enum Script {
    Rows(Vec<String>, Vec<Vec<String>>),
    Timeout(u64),
    DatabaseError,
}

pub struct ScriptedExecutor {
    script: Script,
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            executed: Mutex::new(Vec::new()),
        })
    }

    /// Two columns, one row
    pub fn with_table() -> Arc<Self> {
        Self::new(Script::Rows(
            vec!["Descr".to_string(), "Capacity".to_string()],
            vec![vec!["Totals".to_string(), "70".to_string()]],
        ))
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, ExecutorError> {
        self.executed.lock().unwrap().push(sql.to_string());
        match &self.script {
            Script::Rows(columns, rows) => QueryResult::from_rows(columns.clone(), rows.clone()),
            Script::Timeout(seconds) => Err(ExecutorError::Timeout { seconds: *seconds }),
            Script::DatabaseError => Err(ExecutorError::Database(sqlx::Error::PoolTimedOut)),
        }
    }
}

/// Write `{dir}/xml/{report_id}.xml`
pub fn write_definition(install_path: &Path, report_id: &str, xml: &str) {
    let dir = install_path.join("xml");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{report_id}.xml")), xml).unwrap();
}

pub const AVAIL_DEFINITION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Report>
  <Title>Availability</Title>
  <Objects>
    <Object Class="SQLQuery" Name="InitQuery"><SQL>SELECT 'init'</SQL></Object>
    <Object Class="Label" Name="Caption"><SQL>SELECT 'not a query'</SQL></Object>
    <Object Class="SQLQuery" Name="MainCollectDataQuery">
      <SQL><![CDATA[
        SELECT * FROM stats
        WHERE d BETWEEN '{{FROM_DATE}}' AND '{{TO_DATE}}'
          AND net = {{REVENUE_TYPE}} AND com = {{COMMITMENT_TYPE}} AND x < 3
      ]]></SQL>
    </Object>
  </Objects>
</Report>
"#;

/// Router over `engine` with a fresh store and metrics registry
pub fn test_app(engine: ReportEngine, metrics: Metrics) -> (axum::Router, ReportStore) {
    let store = ReportStore::new(Duration::from_secs(3600), 16);
    let app = routes::app(
        Arc::new(ReportsState {
            engine: Arc::new(engine.with_metrics(metrics.clone())),
            store: store.clone(),
        }),
        Arc::new(MetricsState { metrics }),
    );
    (app, store)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Schema the database suite seeds its PMS tables into
pub const TEST_SCHEMA: &str = "pms_reports_test";

/// Fresh pool whose connections resolve tables in `TEST_SCHEMA` first
///
/// Every `#[tokio::test]` runs on its own runtime and a pool must not outlive
/// the runtime that opened its connections, so each test builds its own.
/// Returns `None` when `DATABASE_URL` is not set; callers skip.
pub async fn test_pool() -> Option<PgPool> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let options = PgConnectOptions::from_str(&database_url).expect("Invalid DATABASE_URL");

    let mut bootstrap = PgConnection::connect_with(&options)
        .await
        .expect("Failed to connect to test database");
    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS {TEST_SCHEMA}"))
        .execute(&mut bootstrap)
        .await
        .expect("Failed to create test schema");
    bootstrap
        .close()
        .await
        .expect("Failed to close bootstrap connection");

    let pool = PgPoolOptions::new()
        .max_connections(3)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options.options([("search_path", TEST_SCHEMA)]))
        .await
        .expect("Failed to create test pool");
    Some(pool)
}
