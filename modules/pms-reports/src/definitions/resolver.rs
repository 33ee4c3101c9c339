//! Report definition lookup
//!
//! Definitions are XML files at `{install_path}/xml/{report_id}.xml`. They are
//! read and parsed on every request; nothing is cached.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Class marker of query objects
pub const SQL_QUERY_CLASS: &str = "SQLQuery";
/// Name fragment identifying the main data-collection query
pub const COLLECT_DATA_MARKER: &str = "CollectData";
/// Title used when a definition has none
pub const DEFAULT_TITLE: &str = "Report";

/// Errors that can occur while resolving a report definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Report definition not found: report_id={report_id}, path={}", path.display())]
    NotFound { report_id: String, path: PathBuf },

    #[error("Report definition {report_id} is invalid: {reason}")]
    InvalidFormat { report_id: String, reason: String },

    #[error("Failed to read report definition {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A named query fragment inside a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryObject {
    pub name: String,
    pub query_text: String,
}

/// Parsed report definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    pub title: String,
    pub query_objects: Vec<QueryObject>,
}

impl ReportDefinition {
    /// Primary data-collection query
    ///
    /// First object whose name contains `CollectData`, otherwise the first
    /// object in document order.
    pub fn main_query(&self) -> Option<&QueryObject> {
        self.query_objects
            .iter()
            .find(|q| q.name.contains(COLLECT_DATA_MARKER))
            .or_else(|| self.query_objects.first())
    }
}

/// Resolves report identifiers to parsed definitions under an installation path
#[derive(Debug, Clone)]
pub struct DefinitionResolver {
    install_path: PathBuf,
}

impl DefinitionResolver {
    pub fn new(install_path: impl Into<PathBuf>) -> Self {
        Self {
            install_path: install_path.into(),
        }
    }

    pub fn install_path(&self) -> &Path {
        &self.install_path
    }

    pub fn definition_path(&self, report_id: &str) -> PathBuf {
        self.install_path
            .join("xml")
            .join(format!("{}.xml", report_id))
    }

    /// Read and parse the definition for `report_id`
    ///
    /// Fails with `NotFound` when the file is missing and `InvalidFormat` when
    /// it is malformed or has no query object.
    pub async fn resolve(&self, report_id: &str) -> Result<ReportDefinition, DefinitionError> {
        let path = self.definition_path(report_id);

        let xml = match tokio::fs::read_to_string(&path).await {
            Ok(xml) => xml,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::error!(report_id, path = %path.display(), "report definition not found");
                return Err(DefinitionError::NotFound {
                    report_id: report_id.to_string(),
                    path,
                });
            }
            Err(source) => {
                tracing::error!(report_id, path = %path.display(), error = %source, "failed to read report definition");
                return Err(DefinitionError::Io { path, source });
            }
        };

        parse_definition(report_id, &xml).inspect_err(|e| {
            tracing::error!(report_id, error = %e, "invalid report definition");
        })
    }
}

/// Parse definition XML
pub fn parse_definition(report_id: &str, xml: &str) -> Result<ReportDefinition, DefinitionError> {
    let invalid = |reason: String| DefinitionError::InvalidFormat {
        report_id: report_id.to_string(),
        reason,
    };

    let mut reader = Reader::from_str(xml);

    let mut title: Option<String> = None;
    let mut in_title = false;
    let mut title_text = String::new();

    let mut query_objects: Vec<QueryObject> = Vec::new();
    // Depth of the open SQLQuery object (element depth), if any
    let mut current: Option<(usize, QueryObject)> = None;
    let mut in_sql = false;
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| invalid(format!("malformed XML at {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                match e.name().as_ref() {
                    b"Title" if title.is_none() && !in_title => {
                        in_title = true;
                        title_text.clear();
                    }
                    b"Object" if current.is_none() => {
                        if let Some(name) = sql_query_name(&e).map_err(invalid)? {
                            current = Some((
                                depth,
                                QueryObject {
                                    name,
                                    query_text: String::new(),
                                },
                            ));
                        }
                    }
                    b"SQL" if current.is_some() => in_sql = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"Object" && current.is_none() {
                    if let Some(name) = sql_query_name(&e).map_err(invalid)? {
                        query_objects.push(QueryObject {
                            name,
                            query_text: String::new(),
                        });
                    }
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| invalid(format!("bad text content: {}", e)))?;
                collect_text(&text, in_title, in_sql, &mut title_text, &mut current);
            }
            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| invalid(format!("CDATA is not UTF-8: {}", e)))?;
                collect_text(&text, in_title, in_sql, &mut title_text, &mut current);
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"Title" if in_title => {
                        in_title = false;
                        title = Some(title_text.trim().to_string());
                    }
                    b"SQL" => in_sql = false,
                    b"Object" => {
                        if matches!(current, Some((d, _)) if d == depth) {
                            if let Some((_, mut object)) = current.take() {
                                object.query_text = object.query_text.trim().to_string();
                                query_objects.push(object);
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if query_objects.is_empty() {
        return Err(invalid(format!(
            "no {} query object found",
            SQL_QUERY_CLASS
        )));
    }

    let title = title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    Ok(ReportDefinition {
        title,
        query_objects,
    })
}

fn collect_text(
    text: &str,
    in_title: bool,
    in_sql: bool,
    title_text: &mut String,
    current: &mut Option<(usize, QueryObject)>,
) {
    if in_title {
        title_text.push_str(text);
    }
    if in_sql {
        if let Some((_, object)) = current.as_mut() {
            object.query_text.push_str(text);
        }
    }
}

/// `Some(name)` when the element is a SQLQuery object
fn sql_query_name(e: &BytesStart<'_>) -> Result<Option<String>, String> {
    let mut class: Option<String> = None;
    let mut name = String::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value: {}", e))?;
        match attr.key.as_ref() {
            b"Class" => class = Some(value.into_owned()),
            b"Name" => name = value.into_owned(),
            _ => {}
        }
    }

    Ok((class.as_deref() == Some(SQL_QUERY_CLASS)).then_some(name))
}
