//! Validation of raw report parameters
//!
//! Controllers receive report parameters as text. This module turns them into
//! a `ReportRequest` or a `ValidationError` the caller reports as a 400.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::models::{CommitmentType, ReportRequest, RevenueType};

/// Validation errors for report requests
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Report ID is required")]
    MissingReportId,

    #[error("Report ID '{0}' must be a plain report name")]
    InvalidReportId(String),

    #[error("{field} is not a valid date: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid date range: from {from} is after to {to}")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
}

pub const DEFAULT_REVENUE_TYPE: &str = "0";
pub const DEFAULT_COMMITMENT_TYPE: &str = "1";

/// Parse and validate raw report parameters
///
/// # Validation Rules
///
/// - `report_id`: non-empty after trimming, no path separators or `..`
/// - `from_date` / `to_date`: `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.f]` or RFC 3339
/// - `from_date` must not be after `to_date`
/// - revenue/commitment codes never fail; see `RevenueType::from_code`
pub fn parse_report_request(
    report_id: Option<&str>,
    from_date: Option<&str>,
    to_date: Option<&str>,
    revenue_type: Option<&str>,
    commitment_type: Option<&str>,
) -> Result<ReportRequest, ValidationError> {
    let report_id = report_id.unwrap_or("");
    validate_report_id(report_id)?;
    let from_date = parse_date("fromDate", from_date)?;
    let to_date = parse_date("toDate", to_date)?;

    build_request(
        report_id,
        from_date,
        to_date,
        revenue_type.unwrap_or(DEFAULT_REVENUE_TYPE),
        commitment_type.unwrap_or(DEFAULT_COMMITMENT_TYPE),
    )
}

/// Build a request from parsed dates and raw codes
pub fn build_request(
    report_id: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
    revenue_type: &str,
    commitment_type: &str,
) -> Result<ReportRequest, ValidationError> {
    let report_id = validate_report_id(report_id)?;

    if from_date > to_date {
        return Err(ValidationError::InvalidDateRange {
            from: from_date,
            to: to_date,
        });
    }

    Ok(ReportRequest {
        report_id,
        from_date,
        to_date,
        revenue_type: RevenueType::from_code(revenue_type),
        commitment_type: CommitmentType::from_code(commitment_type),
    })
}

/// Report IDs name a file stem under `{install_path}/xml`
pub fn validate_report_id(report_id: &str) -> Result<String, ValidationError> {
    let id = report_id.trim();
    if id.is_empty() {
        return Err(ValidationError::MissingReportId);
    }

    if id.contains(['/', '\\', '\0']) || id.contains("..") {
        return Err(ValidationError::InvalidReportId(id.to_string()));
    }

    Ok(id.to_string())
}

fn parse_date(field: &'static str, value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    let raw = value.unwrap_or("").trim();
    let invalid = || ValidationError::InvalidDate {
        field,
        value: raw.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid());
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }

    Err(invalid())
}
