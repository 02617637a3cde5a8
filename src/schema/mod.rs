//! Schema documents: loading, caching and validation.

pub mod document;
pub mod store;
pub mod validator;

pub use document::SchemaDocument;
pub use store::{DirectorySource, MemorySource, SchemaSource, SchemaStore};
pub use validator::{Violation, validate, validate_bytes};
