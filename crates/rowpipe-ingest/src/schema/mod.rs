//! Schema registry access and caching

pub mod cache;
pub mod registry;

pub use cache::SchemaCache;
pub use registry::{HttpSchemaRegistry, SchemaFormat, SchemaRegistry};
