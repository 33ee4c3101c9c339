//! Placeholder substitution for report query templates
//!
//! Tokens are replaced literally (no regex, case-sensitive). Tokens that are
//! not known are left verbatim and reported as warnings.

use std::path::Path;

use crate::definitions::sql_value::SqlValue;
use crate::models::{ReportRequest, HOTEL_ID, STATION_ID};

/// Placeholders understood in definition templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    FromDate,
    ToDate,
    RevenueType,
    CommitmentType,
    InstallPath,
    HotelId,
    StationId,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::FromDate,
        Placeholder::ToDate,
        Placeholder::RevenueType,
        Placeholder::CommitmentType,
        Placeholder::InstallPath,
        Placeholder::HotelId,
        Placeholder::StationId,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::FromDate => "{{FROM_DATE}}",
            Placeholder::ToDate => "{{TO_DATE}}",
            Placeholder::RevenueType => "{{REVENUE_TYPE}}",
            Placeholder::CommitmentType => "{{COMMITMENT_TYPE}}",
            Placeholder::InstallPath => "{{INSTALL_PATH}}",
            Placeholder::HotelId => "{{HOTEL_ID}}",
            Placeholder::StationId => "{{STATION_ID}}",
        }
    }

    fn value(self, request: &ReportRequest, install_path: &Path) -> SqlValue {
        match self {
            Placeholder::FromDate => SqlValue::Date(request.from_date),
            Placeholder::ToDate => SqlValue::Date(request.to_date),
            Placeholder::RevenueType => SqlValue::Code(request.revenue_type.code()),
            Placeholder::CommitmentType => SqlValue::Code(request.commitment_type.code()),
            Placeholder::InstallPath => {
                SqlValue::Text(install_path.to_string_lossy().into_owned())
            }
            Placeholder::HotelId => SqlValue::Code(HOTEL_ID),
            Placeholder::StationId => SqlValue::Code(STATION_ID),
        }
    }
}

/// Replace every known placeholder in `template` with its value for `request`
///
/// Unknown `{{NAME}}` tokens stay in the output; each distinct one is logged
/// as a substitution warning.
pub fn substitute(template: &str, request: &ReportRequest, install_path: &Path) -> String {
    let sql = Placeholder::ALL.iter().fold(template.to_string(), |sql, p| {
        if sql.contains(p.token()) {
            sql.replace(p.token(), &p.value(request, install_path).render())
        } else {
            sql
        }
    });

    for token in unresolved_placeholders(&sql) {
        tracing::warn!(
            report_id = %request.report_id,
            placeholder = %token,
            "unresolved placeholder left in report query"
        );
    }

    sql
}

/// Distinct `{{NAME}}` tokens in `sql`, in order of first appearance
pub fn unresolved_placeholders(sql: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = sql;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };

        let name = &after[..end];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            let token = format!("{{{{{}}}}}", name);
            if !found.contains(&token) {
                found.push(token);
            }
            rest = &after[end + 2..];
        } else {
            rest = after;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentType, RevenueType};
    use chrono::NaiveDate;

    fn request() -> ReportRequest {
        ReportRequest {
            report_id: "AVAIL".to_string(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            revenue_type: RevenueType::Net,
            commitment_type: CommitmentType::Global,
        }
    }

    #[test]
    fn test_all_placeholders_are_replaced() {
        let template = "SELECT * FROM stats WHERE d BETWEEN '{{FROM_DATE}}' AND '{{TO_DATE}}' \
                        AND net = {{REVENUE_TYPE}} AND com = {{COMMITMENT_TYPE}} \
                        AND hotel = {{HOTEL_ID}} AND station = {{STATION_ID}} \
                        -- {{INSTALL_PATH}}";
        let sql = substitute(template, &request(), Path::new("/opt/pms"));
        assert_eq!(
            sql,
            "SELECT * FROM stats WHERE d BETWEEN '2024-01-01' AND '2024-01-07' \
             AND net = 1 AND com = 0 \
             AND hotel = 1 AND station = 1 \
             -- /opt/pms"
        );
        assert!(unresolved_placeholders(&sql).is_empty());
    }

    #[test]
    fn test_repeated_tokens_are_all_replaced() {
        let sql = substitute("{{FROM_DATE}}|{{FROM_DATE}}", &request(), Path::new("/x"));
        assert_eq!(sql, "2024-01-01|2024-01-01");
    }

    #[test]
    fn test_unknown_tokens_are_left_verbatim() {
        let sql = substitute(
            "SELECT {{UNKNOWN}}, {{FROM_DATE}}, {{UNKNOWN}}, {{other_one}}",
            &request(),
            Path::new("/x"),
        );
        assert_eq!(sql, "SELECT {{UNKNOWN}}, 2024-01-01, {{UNKNOWN}}, {{other_one}}");
        assert_eq!(
            unresolved_placeholders(&sql),
            vec!["{{UNKNOWN}}".to_string(), "{{other_one}}".to_string()]
        );
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        let sql = substitute("{{from_date}}", &request(), Path::new("/x"));
        assert_eq!(sql, "{{from_date}}");
    }

    #[test]
    fn test_install_path_quotes_are_doubled() {
        let sql = substitute("'{{INSTALL_PATH}}'", &request(), Path::new("/opt/o'hare"));
        assert_eq!(sql, "'/opt/o''hare'");
    }

    #[test]
    fn test_braces_that_are_not_tokens_are_ignored() {
        assert!(unresolved_placeholders("SELECT '{{}}', '{{ a b }}', '{{unterminated").is_empty());
    }
}
