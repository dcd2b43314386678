//! External sequence service interface.
//!
//! The engine consumes "next value" as an opaque service; it never
//! caches or re-issues values itself. Whatever the service returns at
//! call time is what gets injected.

use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use dashmap::DashMap;

use strata_common::error::StoreError;
use strata_common::types::SequenceId;

pub trait SequenceService: Send + Sync {
    /// Next value of the sequence. The built-in implementation hands out
    /// strictly increasing, never-reused values per identity.
    fn next(&self, sequence: &SequenceId) -> Result<i64, StoreError>;
}

/// In-process sequence service.
#[derive(Debug, Default)]
pub struct InMemorySequenceService {
    sequences: DashMap<SequenceId, AtomicI64>,
}

impl InMemorySequenceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_sequence(&self, sequence: SequenceId, start: i64) -> Result<(), StoreError> {
        if self.sequences.contains_key(&sequence) {
            return Err(StoreError::SequenceAlreadyExists(sequence));
        }
        self.sequences.insert(sequence, AtomicI64::new(start - 1));
        Ok(())
    }

    pub fn drop_sequence(&self, sequence: &SequenceId) -> Result<(), StoreError> {
        self.sequences
            .remove(sequence)
            .map(|_| ())
            .ok_or_else(|| StoreError::SequenceNotFound(sequence.clone()))
    }

    /// Last value handed out (start - 1 if never consumed).
    pub fn current(&self, sequence: &SequenceId) -> Result<i64, StoreError> {
        let entry = self
            .sequences
            .get(sequence)
            .ok_or_else(|| StoreError::SequenceNotFound(sequence.clone()))?;
        Ok(entry.value().load(AtomicOrdering::SeqCst))
    }
}

impl SequenceService for InMemorySequenceService {
    fn next(&self, sequence: &SequenceId) -> Result<i64, StoreError> {
        let entry = self
            .sequences
            .get(sequence)
            .ok_or_else(|| StoreError::SequenceNotFound(sequence.clone()))?;
        Ok(entry.value().fetch_add(1, AtomicOrdering::SeqCst) + 1)
    }
}
