//! Shared foundation for the Strata catalog: identifier newtypes, the
//! schema model exchanged with the metadata store, scalar values for the
//! row-mutation path, the error taxonomy, and configuration.

pub mod config;
pub mod datum;
pub mod error;
pub mod schema;
pub mod types;

pub use config::CatalogConfig;
pub use datum::{Datum, Row};
pub use error::{CatalogError, CatalogResult, ErrorKind, SchemaError, StoreError};
pub use schema::{CacheFrequency, ColumnDefinition, EntityDefinition, EntityKind};
pub use types::{ColumnName, DataType, DdlTimestamp, EntityId, SequenceId};
