pub mod availability_query;
pub mod report_service;

pub use report_service::{ErrorPolicy, PreparedQuery, ReportEngine, ReportError, ReportStrategy};
