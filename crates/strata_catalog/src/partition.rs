//! Auto-partitioning: row-key assignment from an external sequence.
//!
//! Entities created with `AUTO_PARTITION_SEQ` draw the leading pk
//! component from a sequence when an insert does not supply one. The
//! sequence's value is consumed verbatim at call time; this component
//! never caches or re-issues values, and never consults the sequence
//! when an explicit value is present.

use std::sync::Arc;

use strata_common::datum::{Datum, Row};
use strata_common::error::{CatalogError, CatalogResult, SchemaError};
use strata_common::schema::EntityDefinition;
use strata_common::types::{DataType, SequenceId};

use crate::sequence::SequenceService;

pub struct PartitionAssigner {
    sequences: Arc<dyn SequenceService>,
}

impl PartitionAssigner {
    pub fn new(sequences: Arc<dyn SequenceService>) -> Self {
        Self { sequences }
    }

    /// Inject the next sequence value into the row's leading pk slot if
    /// the statement left it unset. `sequence` is the partitioning
    /// sequence of the entity's root base table; `None` passes the row
    /// through untouched.
    pub fn assign_if_needed(
        &self,
        entity: &EntityDefinition,
        sequence: Option<&SequenceId>,
        mut row: Row,
    ) -> CatalogResult<Row> {
        let Some(sequence) = sequence else {
            return Ok(row);
        };
        let Some(lead) = entity.first_pk_column() else {
            return Ok(row);
        };
        let Some(idx) = entity.column_index(&lead.name) else {
            return Ok(row);
        };
        if !row.is_unset(idx) {
            return Ok(row);
        }

        let value = self.sequences.next(sequence)?;
        let datum = match lead.sql_type {
            DataType::Int32 => {
                let narrow = i32::try_from(value).map_err(|_| {
                    CatalogError::Internal(format!(
                        "sequence {} value {} overflows INTEGER partition column",
                        sequence, value
                    ))
                })?;
                Datum::Int32(narrow)
            }
            DataType::Int64 => Datum::Int64(value),
            other => {
                return Err(SchemaError::TypeMismatch {
                    identity: entity.identity.clone(),
                    column: lead.name.clone(),
                    expected: other,
                    actual: DataType::Int64,
                }
                .into())
            }
        };
        tracing::debug!(
            entity = %entity.identity,
            column = %lead.name,
            value,
            "partition key assigned from sequence"
        );
        row.set(idx, datum);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
    use strata_common::error::StoreError;
    use strata_common::schema::{CacheFrequency, ColumnDefinition, EntityKind};
    use strata_common::types::{ColumnName, DdlTimestamp, EntityId};

    /// Scripted sequence: hands out whatever value it currently holds
    /// and counts how often it was consulted.
    struct ScriptedSequence {
        value: AtomicI64,
        calls: AtomicU64,
    }

    impl ScriptedSequence {
        fn new(value: i64) -> Self {
            Self {
                value: AtomicI64::new(value),
                calls: AtomicU64::new(0),
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SequenceService for ScriptedSequence {
        fn next(&self, _sequence: &SequenceId) -> Result<i64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.load(Ordering::SeqCst))
        }
    }

    fn metric_table() -> EntityDefinition {
        EntityDefinition {
            identity: EntityId::new("metric_table"),
            kind: EntityKind::BaseTable,
            parent: None,
            columns: vec![
                ColumnDefinition {
                    name: ColumnName::new("metricId"),
                    sql_type: DataType::Int32,
                    nullable: false,
                    is_pk: true,
                    ordinal_position: 0,
                },
                ColumnDefinition {
                    name: ColumnName::new("metricVal"),
                    sql_type: DataType::Float64,
                    nullable: true,
                    is_pk: false,
                    ordinal_position: 1,
                },
            ],
            pk_columns: vec![ColumnName::new("metricId")],
            base_column_count: 0,
            append_only: true,
            refresh_interval: CacheFrequency::Millis(1),
            auto_partition_sequence: Some(SequenceId::new("metric_id_seq")),
            last_ddl_timestamp: DdlTimestamp(1),
        }
    }

    #[test]
    fn unset_leading_pk_draws_from_sequence() {
        let sequences = Arc::new(ScriptedSequence::new(1));
        let assigner = PartitionAssigner::new(Arc::clone(&sequences) as Arc<dyn SequenceService>);
        let table = metric_table();
        let seq = table.auto_partition_sequence.clone().unwrap();

        let mut row = Row::with_width(2);
        row.set(1, Datum::Float64(1.0));
        let row = assigner
            .assign_if_needed(&table, Some(&seq), row)
            .unwrap();
        assert_eq!(row.get(0), Some(&Datum::Int32(1)));
        assert_eq!(sequences.calls(), 1);
    }

    #[test]
    fn explicit_value_wins_and_sequence_stays_untouched() {
        let sequences = Arc::new(ScriptedSequence::new(1));
        let assigner = PartitionAssigner::new(Arc::clone(&sequences) as Arc<dyn SequenceService>);
        let table = metric_table();
        let seq = table.auto_partition_sequence.clone().unwrap();

        let mut row = Row::with_width(2);
        row.set(0, Datum::Int32(42));
        let row = assigner
            .assign_if_needed(&table, Some(&seq), row)
            .unwrap();
        assert_eq!(row.get(0), Some(&Datum::Int32(42)));
        assert_eq!(sequences.calls(), 0);
    }

    #[test]
    fn no_sequence_passes_row_through() {
        let sequences = Arc::new(ScriptedSequence::new(1));
        let assigner = PartitionAssigner::new(Arc::clone(&sequences) as Arc<dyn SequenceService>);
        let table = metric_table();

        let row = assigner
            .assign_if_needed(&table, None, Row::with_width(2))
            .unwrap();
        assert!(row.is_unset(0));
        assert_eq!(sequences.calls(), 0);
    }

    #[test]
    fn sequence_values_are_consumed_verbatim_not_cached() {
        let sequences = Arc::new(ScriptedSequence::new(1));
        let assigner = PartitionAssigner::new(Arc::clone(&sequences) as Arc<dyn SequenceService>);
        let table = metric_table();
        let seq = table.auto_partition_sequence.clone().unwrap();

        let first = assigner
            .assign_if_needed(&table, Some(&seq), Row::with_width(2))
            .unwrap();
        let second = assigner
            .assign_if_needed(&table, Some(&seq), Row::with_width(2))
            .unwrap();
        // the external sequence did not advance; both rows reflect it
        assert_eq!(first.get(0), Some(&Datum::Int32(1)));
        assert_eq!(second.get(0), Some(&Datum::Int32(1)));

        sequences.value.store(7, Ordering::SeqCst);
        let third = assigner
            .assign_if_needed(&table, Some(&seq), Row::with_width(2))
            .unwrap();
        assert_eq!(third.get(0), Some(&Datum::Int32(7)));
        assert_eq!(sequences.calls(), 3);
    }

    #[test]
    fn non_integer_partition_column_is_rejected() {
        let sequences = Arc::new(ScriptedSequence::new(1));
        let assigner = PartitionAssigner::new(sequences as Arc<dyn SequenceService>);
        let mut table = metric_table();
        table.columns[0].sql_type = DataType::Varchar;

        let seq = table.auto_partition_sequence.clone().unwrap();
        let err = assigner
            .assign_if_needed(&table, Some(&seq), Row::with_width(2))
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::TypeMismatch { .. })
        ));
    }
}
