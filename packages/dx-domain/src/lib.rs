pub mod document;
pub mod filter;
pub mod record;
pub mod tokenize;

pub use document::{Document, DocumentKey};
pub use filter::{FilterCondition, MetadataFilter};
pub use record::{DiagnosisRecord, HealthStatus, RiskLevel, SchemaError};
pub use tokenize::tokenize;
