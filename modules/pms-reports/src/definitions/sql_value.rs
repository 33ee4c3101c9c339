//! Typed values for textual SQL
//!
//! Report SQL is assembled as text. Values only enter it through `SqlValue`,
//! which knows how each kind is written.

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// Rendered as `YYYY-MM-DD`
    Date(NaiveDate),
    /// Small integer flag or identifier
    Code(u8),
    /// Free text; embedded single quotes are doubled
    Text(String),
}

impl SqlValue {
    pub fn render(&self) -> String {
        match self {
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::Code(c) => c.to_string(),
            SqlValue::Text(t) => t.replace('\'', "''"),
        }
    }

    /// Rendered as a quoted SQL literal (`DATE '2024-01-01'`, `1`, `'text'`)
    pub fn literal(&self) -> String {
        match self {
            SqlValue::Date(_) => format!("DATE '{}'", self.render()),
            SqlValue::Code(_) => self.render(),
            SqlValue::Text(_) => format!("'{}'", self.render()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
