//! Connection-factory surface.
//!
//! A [`CatalogFactory`] owns the state shared by every connection it
//! hands out: the metadata store client, the sequence service, the
//! staleness cache and the configuration. The cache lives and dies with
//! the factory; two factories never share one, and sessions from the
//! same factory always do.

use std::sync::Arc;

use strata_common::config::CatalogConfig;
use strata_common::datum::Row;
use strata_common::error::CatalogResult;
use strata_common::types::EntityId;

use crate::cache::StalenessCache;
use crate::clock::{Clock, SystemClock};
use crate::partition::PartitionAssigner;
use crate::resolver::{Resolution, SchemaResolver};
use crate::sequence::SequenceService;
use crate::statement::{AlterAddColumns, CreateStatement, DropColumn};
use crate::store::MetadataStore;

pub struct CatalogFactory {
    store: Arc<dyn MetadataStore>,
    sequences: Arc<dyn SequenceService>,
    cache: Arc<StalenessCache>,
    config: CatalogConfig,
    clock: Arc<dyn Clock>,
}

impl CatalogFactory {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        sequences: Arc<dyn SequenceService>,
        config: CatalogConfig,
    ) -> Self {
        Self::with_clock(store, sequences, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn MetadataStore>,
        sequences: Arc<dyn SequenceService>,
        config: CatalogConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sequences,
            cache: Arc::new(StalenessCache::new()),
            config,
            clock,
        }
    }

    /// Open a session sharing this factory's cache and collaborators.
    pub fn connect(&self) -> CatalogSession {
        CatalogSession {
            resolver: SchemaResolver::new(
                Arc::clone(&self.store),
                Arc::clone(&self.cache),
                Arc::clone(&self.clock),
                self.config.clone(),
            ),
            assigner: PartitionAssigner::new(Arc::clone(&self.sequences)),
        }
    }

    pub fn cache(&self) -> &StalenessCache {
        &self.cache
    }
}

/// One client session. Cheap to create; all sessions from a factory see
/// the same cached definitions.
pub struct CatalogSession {
    resolver: SchemaResolver,
    assigner: PartitionAssigner,
}

impl CatalogSession {
    pub fn resolve_create(&self, stmt: &CreateStatement) -> CatalogResult<Resolution> {
        self.resolver.resolve_create(stmt)
    }

    pub fn resolve_alter(&self, stmt: &AlterAddColumns) -> CatalogResult<Resolution> {
        self.resolver.resolve_alter(stmt)
    }

    pub fn reject_drop(&self, stmt: &DropColumn) -> CatalogResult<()> {
        self.resolver.reject_drop(stmt)
    }

    /// Route a row through the partition assigner. Views inherit the
    /// partitioning sequence of their root base table.
    pub fn assign_partition_key(&self, identity: &EntityId, row: Row) -> CatalogResult<Row> {
        let definition = self.resolver.resolve_entity(identity)?;
        let root = self.resolver.resolve_root(&definition)?;
        self.assigner
            .assign_if_needed(&definition, root.auto_partition_sequence.as_ref(), row)
    }
}
