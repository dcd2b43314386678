//! Schema resolution.
//!
//! Decides whether a schema-defining statement is a no-op, a creation,
//! or an additive merge, consulting the per-factory cache before issuing
//! any round trip. Validation failures are detected before the first
//! RPC; a lost create race and a backend version conflict are each
//! retried locally once, then surfaced.

use std::collections::HashSet;
use std::sync::Arc;

use strata_common::config::CatalogConfig;
use strata_common::error::{CatalogResult, SchemaError, StoreError};
use strata_common::schema::{ColumnDefinition, EntityDefinition, EntityKind};
use strata_common::types::{ColumnName, EntityId};

use crate::cache::{CacheEntry, StalenessCache};
use crate::clock::Clock;
use crate::evolution::{self, SchemaDelta};
use crate::statement::{AlterAddColumns, CreateStatement, DropColumn};
use crate::store::MetadataStore;

/// Outcome of resolving a schema-defining statement. Two of the three
/// outcomes are normal control flow; only validation failures and
/// exhausted retries are errors.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The catalog already matches the declaration; no mutation issued.
    NoOp,
    /// The entity was registered with this definition.
    Create(Arc<EntityDefinition>),
    /// Columns were appended to an existing entity.
    Merge {
        added_columns: Vec<ColumnDefinition>,
        added_pk: Vec<ColumnName>,
    },
}

/// A decision plus the definition the statement resolved to.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub decision: Decision,
    pub definition: Arc<EntityDefinition>,
}

pub struct SchemaResolver {
    store: Arc<dyn MetadataStore>,
    cache: Arc<StalenessCache>,
    clock: Arc<dyn Clock>,
    config: CatalogConfig,
}

impl SchemaResolver {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        cache: Arc<StalenessCache>,
        clock: Arc<dyn Clock>,
        config: CatalogConfig,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            config,
        }
    }

    fn entry_is_fresh(&self, entry: &CacheEntry) -> bool {
        let age = entry.age_ms(self.clock.now_ms());
        self.config
            .effective_refresh(entry.definition.refresh_interval)
            .fresh_within(age)
    }

    fn fetch_and_cache(&self, identity: &EntityId) -> Result<Arc<EntityDefinition>, StoreError> {
        match self.store.fetch(identity) {
            Ok(definition) => {
                let definition = Arc::new(definition);
                self.cache
                    .store(Arc::clone(&definition), self.clock.now_ms());
                Ok(definition)
            }
            Err(StoreError::NotFound(id)) => {
                // the entity went away out-of-band; stop serving the handle
                self.cache.invalidate(identity);
                Err(StoreError::NotFound(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Definition for an identity, served from the cache while fresh.
    pub fn resolve_entity(&self, identity: &EntityId) -> CatalogResult<Arc<EntityDefinition>> {
        if let Some(entry) = self.cache.lookup(identity) {
            if self.entry_is_fresh(&entry) {
                tracing::debug!(entity = %identity, "definition served from cache");
                return Ok(entry.definition);
            }
        }
        Ok(self.fetch_and_cache(identity)?)
    }

    /// Walk a view hierarchy to its root base table. Iterative, with
    /// cycle detection; a cycle is a broken catalog, not a user error.
    pub fn resolve_root(
        &self,
        definition: &Arc<EntityDefinition>,
    ) -> CatalogResult<Arc<EntityDefinition>> {
        let mut visited: HashSet<EntityId> = HashSet::new();
        visited.insert(definition.identity.clone());
        let mut current = Arc::clone(definition);
        while let Some(parent) = current.parent.clone() {
            if !visited.insert(parent.clone()) {
                return Err(SchemaError::ViewCycle { identity: parent }.into());
            }
            current = self.resolve_entity(&parent)?;
        }
        Ok(current)
    }

    /// Resolve a CREATE statement: fast path from the cache, else fetch
    /// and decide between create, no-op and additive merge.
    pub fn resolve_create(&self, stmt: &CreateStatement) -> CatalogResult<Resolution> {
        let refresh = stmt
            .props
            .update_cache_frequency
            .unwrap_or(self.config.default_update_cache_frequency);
        evolution::validate_declaration(stmt, refresh)?;

        // Fresh cached definition covering the declaration: the
        // statement is a no-op with zero round trips. Only IF NOT EXISTS
        // statements may short-circuit; a bare re-declaration must reach
        // the authoritative check. Policy violations (removed column,
        // type change) fail here, before any RPC.
        if stmt.if_not_exists {
            if let Some(entry) = self.cache.lookup(&stmt.identity) {
                if self.entry_is_fresh(&entry) {
                    match evolution::evolve(&entry.definition, &stmt.columns, &stmt.pk)? {
                        SchemaDelta::Unchanged | SchemaDelta::Diverged { .. } => {
                            tracing::debug!(
                                entity = %stmt.identity,
                                "declaration satisfied from cache"
                            );
                            return Ok(Resolution {
                                decision: Decision::NoOp,
                                definition: entry.definition,
                            });
                        }
                        // additions need the authoritative definition
                        SchemaDelta::Extended { .. } => {}
                    }
                }
            }
        }

        let base = match (stmt.kind, &stmt.parent) {
            (EntityKind::View, Some(parent)) => {
                let base = self.resolve_entity(parent)?;
                evolution::validate_view_props(stmt, &base)?;
                Some(base)
            }
            _ => None,
        };

        let mut create_attempts = 0u32;
        loop {
            match self.store.fetch(&stmt.identity) {
                Ok(existing) => return self.resolve_against_existing(stmt, existing),
                Err(StoreError::NotFound(_)) => {
                    let definition = match &base {
                        Some(base) => evolution::build_view_definition(base, stmt, refresh)?,
                        None => evolution::build_table_definition(stmt, refresh),
                    };
                    match self.store.create_entity(&definition) {
                        Ok(()) => {
                            let definition = Arc::new(definition);
                            self.cache
                                .store(Arc::clone(&definition), self.clock.now_ms());
                            tracing::info!(
                                entity = %definition.identity,
                                kind = %definition.kind,
                                columns = definition.columns.len(),
                                "entity created"
                            );
                            return Ok(Resolution {
                                decision: Decision::Create(Arc::clone(&definition)),
                                definition,
                            });
                        }
                        Err(StoreError::AlreadyExists(_)) if create_attempts == 0 => {
                            // another session won the race; re-decide
                            // against its definition, exactly once
                            create_attempts += 1;
                            tracing::warn!(entity = %stmt.identity, "create raced, re-resolving");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn resolve_against_existing(
        &self,
        stmt: &CreateStatement,
        mut existing: EntityDefinition,
    ) -> CatalogResult<Resolution> {
        let mut conflict_retries = 0u32;
        loop {
            match evolution::evolve(&existing, &stmt.columns, &stmt.pk)? {
                SchemaDelta::Unchanged | SchemaDelta::Diverged { .. } => {
                    let definition = Arc::new(existing);
                    self.cache
                        .store(Arc::clone(&definition), self.clock.now_ms());
                    if stmt.if_not_exists {
                        return Ok(Resolution {
                            decision: Decision::NoOp,
                            definition,
                        });
                    }
                    return Err(StoreError::AlreadyExists(stmt.identity.clone()).into());
                }
                SchemaDelta::Extended {
                    mut merged,
                    added_columns,
                    added_pk,
                } => {
                    match self.store.mutate_columns(
                        &stmt.identity,
                        &added_columns,
                        &added_pk,
                        existing.last_ddl_timestamp,
                    ) {
                        Ok(new_ts) => {
                            merged.last_ddl_timestamp = new_ts;
                            let definition = Arc::new(merged);
                            self.cache
                                .store(Arc::clone(&definition), self.clock.now_ms());
                            tracing::info!(
                                entity = %stmt.identity,
                                added = added_columns.len(),
                                version = %new_ts,
                                "additive merge applied"
                            );
                            return Ok(Resolution {
                                decision: Decision::Merge {
                                    added_columns,
                                    added_pk,
                                },
                                definition,
                            });
                        }
                        Err(StoreError::VersionConflict { .. })
                            if conflict_retries < self.config.conflict_retry_limit =>
                        {
                            conflict_retries += 1;
                            tracing::warn!(
                                entity = %stmt.identity,
                                "version conflict, refetching and re-merging"
                            );
                            existing = self.store.fetch(&stmt.identity)?;
                        }
                        Err(StoreError::NotFound(id)) => {
                            self.cache.invalidate(&stmt.identity);
                            return Err(StoreError::NotFound(id).into());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
    }

    /// Resolve an add-column statement.
    pub fn resolve_alter(&self, stmt: &AlterAddColumns) -> CatalogResult<Resolution> {
        let mut existing = (*self.resolve_entity(&stmt.identity)?).clone();
        let mut conflict_retries = 0u32;
        loop {
            let (mut merged, added_columns, added_pk) =
                evolution::evolve_additive(&existing, &stmt.columns, &stmt.pk)?;
            if added_columns.is_empty() {
                let definition = Arc::new(existing);
                return Ok(Resolution {
                    decision: Decision::NoOp,
                    definition,
                });
            }
            match self.store.mutate_columns(
                &stmt.identity,
                &added_columns,
                &added_pk,
                existing.last_ddl_timestamp,
            ) {
                Ok(new_ts) => {
                    merged.last_ddl_timestamp = new_ts;
                    let definition = Arc::new(merged);
                    self.cache
                        .store(Arc::clone(&definition), self.clock.now_ms());
                    tracing::info!(
                        entity = %stmt.identity,
                        added = added_columns.len(),
                        version = %new_ts,
                        "columns added"
                    );
                    return Ok(Resolution {
                        decision: Decision::Merge {
                            added_columns,
                            added_pk,
                        },
                        definition,
                    });
                }
                Err(StoreError::VersionConflict { .. })
                    if conflict_retries < self.config.conflict_retry_limit =>
                {
                    conflict_retries += 1;
                    tracing::warn!(entity = %stmt.identity, "version conflict on alter, refetching");
                    existing = self.store.fetch(&stmt.identity)?;
                }
                Err(StoreError::NotFound(id)) => {
                    self.cache.invalidate(&stmt.identity);
                    return Err(StoreError::NotFound(id).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Gate a drop-column statement. Ok(()) means the entity is mutable
    /// and the drop belongs to the external executor; append-only
    /// entities reject it here, before anything is issued.
    pub fn reject_drop(&self, stmt: &DropColumn) -> CatalogResult<()> {
        let definition = self.resolve_entity(&stmt.identity)?;
        if definition.find_column(&stmt.column).is_none() {
            return Err(SchemaError::UnknownColumn {
                identity: stmt.identity.clone(),
                column: stmt.column.clone(),
            }
            .into());
        }
        if definition.append_only {
            return Err(SchemaError::DropRejected {
                identity: stmt.identity.clone(),
                column: stmt.column.clone(),
            }
            .into());
        }
        Ok(())
    }
}
