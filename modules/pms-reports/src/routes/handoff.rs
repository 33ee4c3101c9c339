//! Report handoff
//!
//! A client posts a generated `ReportModel` and is redirected to a view URL
//! that carries only the entry id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::ReportModel;
use crate::routes::report::ReportErrorResponse;
use crate::routes::view::{render_message, render_report};
use crate::routes::ReportsState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReportResponse {
    pub id: Uuid,
    pub view_url: String,
}

pub fn view_url(id: &Uuid) -> String {
    format!("/report/view/{}", id)
}

/// Handler for POST /api/reports
pub async fn store_report(
    State(state): State<Arc<ReportsState>>,
    Json(model): Json<ReportModel>,
) -> Result<(StatusCode, Json<StoredReportResponse>), ReportErrorResponse> {
    if !model.is_rectangular() {
        return Err(ReportErrorResponse {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Every row must have one value per column".to_string(),
        });
    }

    let id = state.store.put(model);
    tracing::info!(%id, "stored report for viewing");

    Ok((
        StatusCode::CREATED,
        Json(StoredReportResponse {
            view_url: view_url(&id),
            id,
        }),
    ))
}

/// Handler for GET /report/view/{id}
pub async fn view_stored_report(
    State(state): State<Arc<ReportsState>>,
    Path(id): Path<String>,
) -> Response {
    let model = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.store.get(&id));

    match model {
        Some(model) => Html(render_report(&model)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html(render_message(
                "Report Not Found",
                "The report does not exist or has expired.",
            )),
        )
            .into_response(),
    }
}
