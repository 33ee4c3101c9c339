//! HTML report pages
//!
//! A parameter form, a generated report page and the shared table renderer.
//! All text coming from reports or requests is HTML-escaped.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write;
use std::sync::Arc;

use crate::models::ReportModel;
use crate::routes::report::{status_for, ReportQuery};
use crate::routes::ReportsState;
use crate::services::ReportError;

/// Handler for GET /report
pub async fn report_form() -> Html<String> {
    Html(render_form())
}

/// Handler for GET /report/generate
pub async fn generate_report_page(
    State(state): State<Arc<ReportsState>>,
    Query(params): Query<ReportQuery>,
) -> Response {
    let request = match params.to_request() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "rejected report request");
            return error_page(ReportError::from(e));
        }
    };

    match state.engine.generate(&request).await {
        Ok(model) => Html(render_report(&model)).into_response(),
        Err(e) => error_page(e),
    }
}

fn error_page(error: ReportError) -> Response {
    let status = status_for(&error);
    (status, Html(render_message("Report Error", &error.to_string()))).into_response()
}

pub fn render_form() -> String {
    page(
        "Reports",
        r#"<h1>Reports</h1>
<form method="get" action="/report/generate">
  <label>Report <input name="reportId" value="AVAIL" required></label>
  <label>From <input type="date" name="fromDate" required></label>
  <label>To <input type="date" name="toDate" required></label>
  <label>Revenue
    <select name="revenueType">
      <option value="0">Gross</option>
      <option value="1">Net</option>
    </select>
  </label>
  <label>Commitment
    <select name="comType">
      <option value="1">Detailed</option>
      <option value="0">Global</option>
    </select>
  </label>
  <button type="submit">Generate</button>
</form>"#,
    )
}

/// Render a report model as a standalone HTML page
pub fn render_report(model: &ReportModel) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "<h1>{}</h1>", escape_html(&model.title));
    let _ = writeln!(
        body,
        "<p>Period {} to {} &middot; Revenue: {} &middot; Commitment: {}</p>",
        model.from_date,
        model.to_date,
        escape_html(&model.revenue_type),
        escape_html(&model.commitment_type)
    );

    body.push_str("<table>\n<thead><tr>");
    for name in &model.column_names {
        let _ = write!(body, "<th>{}</th>", escape_html(name));
    }
    body.push_str("</tr></thead>\n<tbody>\n");
    for row in &model.rows {
        body.push_str("<tr>");
        for value in row {
            let _ = write!(body, "<td>{}</td>", escape_html(value));
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</tbody>\n</table>");

    page(&model.title, &body)
}

pub fn render_message(title: &str, message: &str) -> String {
    page(
        title,
        &format!(
            "<h1>{}</h1>\n<p>{}</p>",
            escape_html(title),
            escape_html(message)
        ),
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_report_table() {
        let model = ReportModel {
            report_id: "AVAIL".to_string(),
            title: "Availability <Period>".to_string(),
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            revenue_type: "Gross".to_string(),
            commitment_type: "Detailed".to_string(),
            column_names: vec!["Descr".to_string(), "Capacity".to_string()],
            rows: vec![vec!["Double & Twin".to_string(), "70".to_string()]],
        };

        let html = render_report(&model);
        assert!(html.contains("<h1>Availability &lt;Period&gt;</h1>"));
        assert!(html.contains("Period 2024-01-01 to 2024-01-07"));
        assert!(html.contains("<th>Descr</th><th>Capacity</th>"));
        assert!(html.contains("<td>Double &amp; Twin</td><td>70</td>"));
    }

    #[test]
    fn test_form_targets_generate_page() {
        let html = render_form();
        assert!(html.contains(r#"action="/report/generate""#));
        assert!(html.contains(r#"name="comType""#));
    }
}
