//! Report request and report model types
//!
//! `ReportRequest` is what the engine consumes (already parsed and validated),
//! `ReportModel` is what it hands back to controllers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Property scope of every report; not selectable by callers
pub const HOTEL_ID: u8 = 1;
pub const STATION_ID: u8 = 1;

/// Revenue basis used for rate calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueType {
    Gross,
    Net,
}

impl RevenueType {
    /// `"0"` selects gross revenue, every other code selects net
    pub fn from_code(code: &str) -> Self {
        if code == "0" {
            RevenueType::Gross
        } else {
            RevenueType::Net
        }
    }

    /// Numeric code passed to SQL
    pub fn code(self) -> u8 {
        match self {
            RevenueType::Gross => 0,
            RevenueType::Net => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RevenueType::Gross => "Gross",
            RevenueType::Net => "Net",
        }
    }
}

/// Report granularity; currently only affects labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentType {
    Global,
    Detailed,
}

impl CommitmentType {
    /// `"1"` selects the detailed breakdown, every other code selects global
    pub fn from_code(code: &str) -> Self {
        if code == "1" {
            CommitmentType::Detailed
        } else {
            CommitmentType::Global
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CommitmentType::Global => 0,
            CommitmentType::Detailed => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CommitmentType::Global => "Global",
            CommitmentType::Detailed => "Detailed",
        }
    }
}

/// A validated report request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub report_id: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub revenue_type: RevenueType,
    pub commitment_type: CommitmentType,
}

/// Fully materialized tabular report
///
/// Serialized with camelCase field names; this is the JSON body of the
/// report API and the payload accepted by the handoff endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub report_id: String,
    pub title: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub revenue_type: String,
    pub commitment_type: String,
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportModel {
    /// Degraded report carrying a single error message
    pub fn error_report(request: &ReportRequest, message: impl Into<String>) -> Self {
        Self {
            report_id: request.report_id.clone(),
            title: ERROR_REPORT_TITLE.to_string(),
            from_date: request.from_date,
            to_date: request.to_date,
            revenue_type: request.revenue_type.label().to_string(),
            commitment_type: request.commitment_type.label().to_string(),
            column_names: vec!["Error".to_string()],
            rows: vec![vec![message.into()]],
        }
    }

    pub fn is_error_report(&self) -> bool {
        self.title == ERROR_REPORT_TITLE && self.column_names == ["Error"]
    }

    /// Every row has as many cells as there are columns
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.column_names.len())
    }
}

pub const ERROR_REPORT_TITLE: &str = "Error Report";
