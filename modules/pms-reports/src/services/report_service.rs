//! Report Generation Service
//!
//! Turns a `ReportRequest` into a `ReportModel`. The SQL comes from one of two
//! strategies selected by configuration:
//!
//! - **Builtin**: the hand-built availability script, whatever the report id
//! - **Definition**: `{install_path}/xml/{report_id}.xml`, main query with
//!   placeholders substituted
//!
//! The error policy decides what happens when a definition is unusable or the
//! query fails: `Degrade` answers with an "Error Report" model, `Propagate`
//! returns the typed error. Validation errors and missing definitions are
//! always returned as errors.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::Instrument;

use crate::definitions::{substitute, DefinitionError, DefinitionResolver};
use crate::metrics::Metrics;
use crate::models::{ReportModel, ReportRequest};
use crate::repos::{ExecutorError, QueryExecutor, QueryResult};
use crate::services::availability_query::{self, AVAILABILITY_REPORT_TITLE};
use crate::validation::{self, ValidationError};

/// Errors returned by report generation
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Execution(#[from] ExecutorError),
}

impl ReportError {
    /// Failures that never turn into a degraded report
    fn is_caller_facing(&self) -> bool {
        matches!(
            self,
            ReportError::Validation(_) | ReportError::Definition(DefinitionError::NotFound { .. })
        )
    }
}

/// Where the report SQL comes from
#[derive(Debug, Clone)]
pub enum ReportStrategy {
    /// Built-in availability script
    Builtin,
    /// XML definitions resolved under an installation path
    Definition(DefinitionResolver),
}

impl ReportStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ReportStrategy::Builtin => "builtin",
            ReportStrategy::Definition(_) => "definition",
        }
    }

    /// Default error policy of the strategy
    pub fn default_error_policy(&self) -> ErrorPolicy {
        match self {
            ReportStrategy::Builtin => ErrorPolicy::Degrade,
            ReportStrategy::Definition(_) => ErrorPolicy::Propagate,
        }
    }
}

/// What to do with generation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Answer with an "Error Report" model carrying the message
    Degrade,
    /// Return the typed error to the caller
    Propagate,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "degrade" => Ok(ErrorPolicy::Degrade),
            "propagate" => Ok(ErrorPolicy::Propagate),
            other => Err(format!(
                "Invalid error policy: {}. Must be 'degrade' or 'propagate'",
                other
            )),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Degrade => f.write_str("degrade"),
            ErrorPolicy::Propagate => f.write_str("propagate"),
        }
    }
}

/// A ready-to-run query plus the title it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub title: String,
    pub sql: String,
}

/// Report generation engine
///
/// Stateless apart from its injected collaborators; share it behind an `Arc`
/// and call `generate` concurrently.
pub struct ReportEngine {
    executor: Arc<dyn QueryExecutor>,
    strategy: ReportStrategy,
    error_policy: ErrorPolicy,
    metrics: Option<Metrics>,
}

impl ReportEngine {
    pub fn new(executor: Arc<dyn QueryExecutor>, strategy: ReportStrategy) -> Self {
        let error_policy = strategy.default_error_policy();
        Self {
            executor,
            strategy,
            error_policy,
            metrics: None,
        }
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Generate a report from already-parsed parameters
    ///
    /// Codes follow `RevenueType::from_code` / `CommitmentType::from_code`.
    pub async fn generate_report(
        &self,
        report_id: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
        revenue_type_code: &str,
        commitment_type_code: &str,
    ) -> Result<ReportModel, ReportError> {
        let request = validation::build_request(
            report_id,
            from_date,
            to_date,
            revenue_type_code,
            commitment_type_code,
        )
        .inspect_err(|e| tracing::warn!(report_id, error = %e, "invalid report request"))?;

        self.generate(&request).await
    }

    /// Generate the report described by `request`
    pub async fn generate(&self, request: &ReportRequest) -> Result<ReportModel, ReportError> {
        if let Err(e) = validation::validate_report_id(&request.report_id) {
            tracing::warn!(report_id = %request.report_id, error = %e, "invalid report request");
            return Err(e.into());
        }

        let span = tracing::info_span!(
            "generate_report",
            report_id = %request.report_id,
            from_date = %request.from_date,
            to_date = %request.to_date,
            strategy = self.strategy.name()
        );

        async {
            let started = Instant::now();
            tracing::info!(
                "Generating report {} for period {} to {}",
                request.report_id,
                request.from_date,
                request.to_date
            );

            let outcome = match self.run(request).await {
                Ok(model) => Ok(model),
                Err(e) if self.error_policy == ErrorPolicy::Degrade && !e.is_caller_facing() => {
                    tracing::info!("returning degraded error report");
                    Ok(ReportModel::error_report(request, e.to_string()))
                }
                Err(e) => Err(e),
            };

            self.record(&outcome, started);
            outcome
        }
        .instrument(span)
        .await
    }

    /// Resolve the SQL for `request` without executing it
    pub async fn prepare(&self, request: &ReportRequest) -> Result<PreparedQuery, ReportError> {
        match &self.strategy {
            ReportStrategy::Builtin => Ok(builtin_query(request)),
            ReportStrategy::Definition(resolver) => definition_query(resolver, request).await,
        }
    }

    async fn run(&self, request: &ReportRequest) -> Result<ReportModel, ReportError> {
        let prepared = self.prepare(request).await?;
        let result = self.executor.execute_query(&prepared.sql).await?;
        Ok(assemble(request, prepared.title, result))
    }

    fn record(&self, outcome: &Result<ReportModel, ReportError>, started: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        let label = match outcome {
            Ok(model) if model.is_error_report() => "degraded",
            Ok(_) => "success",
            Err(_) => "error",
        };
        let strategy = self.strategy.name();
        metrics
            .reports_generated_total
            .with_label_values(&[strategy, label])
            .inc();
        metrics
            .report_generation_duration_seconds
            .with_label_values(&[strategy])
            .observe(started.elapsed().as_secs_f64());
    }
}

fn builtin_query(request: &ReportRequest) -> PreparedQuery {
    PreparedQuery {
        title: AVAILABILITY_REPORT_TITLE.to_string(),
        sql: availability_query::build(
            request.from_date,
            request.to_date,
            request.revenue_type,
            request.commitment_type,
        ),
    }
}

async fn definition_query(
    resolver: &DefinitionResolver,
    request: &ReportRequest,
) -> Result<PreparedQuery, ReportError> {
    let definition = resolver.resolve(&request.report_id).await?;

    let main = definition
        .main_query()
        .filter(|q| !q.query_text.is_empty())
        .ok_or_else(|| {
            let e = DefinitionError::InvalidFormat {
                report_id: request.report_id.clone(),
                reason: "main query object has no SQL text".to_string(),
            };
            tracing::error!(error = %e, "invalid report definition");
            e
        })?;

    tracing::debug!(query = %main.name, "selected definition query");

    Ok(PreparedQuery {
        sql: substitute(&main.query_text, request, resolver.install_path()),
        title: definition.title,
    })
}

/// Map a raw query result onto the report model
pub fn assemble(request: &ReportRequest, title: String, result: QueryResult) -> ReportModel {
    let (column_names, rows) = result.into_parts();
    ReportModel {
        report_id: request.report_id.clone(),
        title,
        from_date: request.from_date,
        to_date: request.to_date,
        revenue_type: request.revenue_type.label().to_string(),
        commitment_type: request.commitment_type.label().to_string(),
        column_names,
        rows,
    }
}
