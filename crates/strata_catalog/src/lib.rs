//! Schema-metadata resolution for a SQL layer over a distributed column
//! store.
//!
//! The engine decides whether a schema-defining statement needs a round
//! trip to the metadata store or can be answered from a per-factory
//! cache, merges column/pk definitions across base tables and their
//! dependent views under an append-only policy, and assigns partition
//! keys from an external sequence for entities that declare
//! auto-partitioning.
//!
//! Layering, leaf first:
//! - [`store`] — metadata store client interface + in-memory reference
//! - [`sequence`] — external sequence service interface
//! - [`cache`] — per-factory staleness cache (pure keyed map)
//! - [`evolution`] — pure merge/validation over definition snapshots
//! - [`resolver`] — decision logic and RPC orchestration
//! - [`partition`] — row-key assignment from a sequence
//! - [`factory`] — connection-factory surface tying it together

pub mod cache;
pub mod clock;
pub mod evolution;
pub mod factory;
pub mod partition;
pub mod resolver;
pub mod sequence;
pub mod statement;
pub mod store;

pub use cache::{CacheEntry, CacheStats, StalenessCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use evolution::SchemaDelta;
pub use factory::{CatalogFactory, CatalogSession};
pub use partition::PartitionAssigner;
pub use resolver::{Decision, Resolution, SchemaResolver};
pub use sequence::{InMemorySequenceService, SequenceService};
pub use statement::{
    AlterAddColumns, CreateStatement, DeclaredColumn, DropColumn, EntityProps,
};
pub use store::{InMemoryMetadataStore, MetadataStore, StoreCallStats};
