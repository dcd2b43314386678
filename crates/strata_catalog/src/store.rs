//! Metadata store client.
//!
//! [`MetadataStore`] is the narrow interface to the backend catalog.
//! Implementations transport definition snapshots; they never interpret
//! schema-change policy, which lives entirely on the client side of this
//! interface.
//!
//! [`InMemoryMetadataStore`] is the reference implementation: snapshots
//! are held JSON-serialized so every fetch hands out an independent
//! copy, and per-operation call counters make round-trip behavior
//! observable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use strata_common::error::StoreError;
use strata_common::schema::{ColumnDefinition, EntityDefinition};
use strata_common::types::{ColumnName, DdlTimestamp, EntityId};

/// Client interface to the backend catalog.
pub trait MetadataStore: Send + Sync {
    /// Authoritative definition for an identity.
    fn fetch(&self, identity: &EntityId) -> Result<EntityDefinition, StoreError>;

    /// Register a new entity. Fails with `AlreadyExists` when another
    /// writer got there first; the catalog arbitrates the race.
    fn create_entity(&self, definition: &EntityDefinition) -> Result<(), StoreError>;

    /// Append columns to an existing entity, guarded by the version
    /// stamp the caller last observed. Returns the new stamp.
    fn mutate_columns(
        &self,
        identity: &EntityId,
        added: &[ColumnDefinition],
        added_pk: &[ColumnName],
        expected: DdlTimestamp,
    ) -> Result<DdlTimestamp, StoreError>;

    /// Remove an entity. This engine never drops entities on its own
    /// decision paths; the operation exists for the out-of-band deletion
    /// path owned by the wider catalog.
    fn drop_entity(&self, identity: &EntityId) -> Result<(), StoreError>;
}

/// Per-operation call counts, cumulative since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCallStats {
    pub fetch_calls: u64,
    pub create_calls: u64,
    pub mutate_calls: u64,
}

/// In-process backend catalog.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entities: RwLock<HashMap<EntityId, String>>,
    fetch_calls: AtomicU64,
    create_calls: AtomicU64,
    mutate_calls: AtomicU64,
}

fn encode(definition: &EntityDefinition) -> Result<String, StoreError> {
    serde_json::to_string(definition).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode(snapshot: &str) -> Result<EntityDefinition, StoreError> {
    serde_json::from_str(snapshot).map_err(|e| StoreError::Codec(e.to_string()))
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_stats(&self) -> StoreCallStats {
        StoreCallStats {
            fetch_calls: self.fetch_calls.load(Ordering::Relaxed),
            create_calls: self.create_calls.load(Ordering::Relaxed),
            mutate_calls: self.mutate_calls.load(Ordering::Relaxed),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn fetch(&self, identity: &EntityId) -> Result<EntityDefinition, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let entities = self.entities.read();
        let snapshot = entities
            .get(identity)
            .ok_or_else(|| StoreError::NotFound(identity.clone()))?;
        decode(snapshot)
    }

    fn create_entity(&self, definition: &EntityDefinition) -> Result<(), StoreError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        let snapshot = encode(definition)?;
        let mut entities = self.entities.write();
        if entities.contains_key(&definition.identity) {
            return Err(StoreError::AlreadyExists(definition.identity.clone()));
        }
        entities.insert(definition.identity.clone(), snapshot);
        tracing::debug!(entity = %definition.identity, kind = %definition.kind, "entity registered");
        Ok(())
    }

    fn mutate_columns(
        &self,
        identity: &EntityId,
        added: &[ColumnDefinition],
        added_pk: &[ColumnName],
        expected: DdlTimestamp,
    ) -> Result<DdlTimestamp, StoreError> {
        self.mutate_calls.fetch_add(1, Ordering::Relaxed);
        let mut entities = self.entities.write();
        let snapshot = entities
            .get(identity)
            .ok_or_else(|| StoreError::NotFound(identity.clone()))?;
        let mut definition = decode(snapshot)?;
        if definition.last_ddl_timestamp != expected {
            return Err(StoreError::VersionConflict {
                identity: identity.clone(),
                expected,
                actual: definition.last_ddl_timestamp,
            });
        }

        // The store owns ordinal allocation; positions continue past the
        // highest already assigned and are never reused.
        let mut ordinal = definition.max_ordinal() + 1;
        for column in added {
            let mut column = column.clone();
            column.ordinal_position = ordinal;
            ordinal += 1;
            definition.columns.push(column);
        }
        definition.pk_columns.extend(added_pk.iter().cloned());
        definition.last_ddl_timestamp = definition.last_ddl_timestamp.next();

        let new_ts = definition.last_ddl_timestamp;
        let encoded = encode(&definition)?;
        entities.insert(identity.clone(), encoded);
        tracing::debug!(entity = %identity, added = added.len(), version = %new_ts, "columns appended");
        Ok(new_ts)
    }

    fn drop_entity(&self, identity: &EntityId) -> Result<(), StoreError> {
        let mut entities = self.entities.write();
        entities
            .remove(identity)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(identity.clone()))
    }
}
