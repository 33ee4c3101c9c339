//! XML report definitions and query template substitution

pub mod resolver;
pub mod sql_value;
pub mod substitution;

pub use resolver::{DefinitionError, DefinitionResolver, QueryObject, ReportDefinition};
pub use sql_value::SqlValue;
pub use substitution::{substitute, unresolved_placeholders, Placeholder};
