//! Report API Routes
//!
//! `GET /api/report` generates a report and answers with the `ReportModel` JSON.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::definitions::DefinitionError;
use crate::models::{ReportModel, ReportRequest};
use crate::repos::ExecutorError;
use crate::routes::ReportsState;
use crate::services::ReportError;
use crate::validation::{self, ValidationError};

/// Query parameters shared by the JSON and HTML report endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub report_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    /// "0" = Gross, anything else = Net
    pub revenue_type: Option<String>,
    /// "1" = Detailed, anything else = Global
    pub com_type: Option<String>,
}

impl ReportQuery {
    pub fn to_request(&self) -> Result<ReportRequest, ValidationError> {
        validation::parse_report_request(
            self.report_id.as_deref(),
            self.from_date.as_deref(),
            self.to_date.as_deref(),
            self.revenue_type.as_deref(),
            self.com_type.as_deref(),
        )
    }
}

/// Report error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler for GET /api/report
pub async fn get_report(
    State(state): State<Arc<ReportsState>>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<ReportModel>, ReportErrorResponse> {
    let request = params.to_request().map_err(|e| {
        tracing::warn!(error = %e, "rejected report request");
        ReportError::from(e)
    })?;

    let model = state.engine.generate(&request).await?;
    Ok(Json(model))
}

/// HTTP status for a report generation failure
pub fn status_for(error: &ReportError) -> StatusCode {
    match error {
        ReportError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportError::Definition(DefinitionError::NotFound { .. }) => StatusCode::NOT_FOUND,
        ReportError::Definition(DefinitionError::InvalidFormat { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ReportError::Definition(DefinitionError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        ReportError::Execution(ExecutorError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        ReportError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response wrapper for proper HTTP error handling
#[derive(Debug)]
pub struct ReportErrorResponse {
    pub status: StatusCode,
    pub message: String,
}

impl From<ReportError> for ReportErrorResponse {
    fn from(error: ReportError) -> Self {
        Self {
            status: status_for(&error),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ReportErrorResponse {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
