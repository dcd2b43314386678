//! Append-only schema evolution.
//!
//! Pure computation over definition snapshots: given what the catalog
//! stores and what a statement declares, produce the delta and the
//! merged definition, or reject the declaration. Nothing here issues a
//! round trip; the resolver decides when to consult the store.
//!
//! Ordering contract: existing columns keep their original order, newly
//! introduced columns are appended in declaration order. For a view this
//! yields the base entity's columns first, then each generation of the
//! view's own columns in the order it added them. New pk columns extend
//! the pk subsequence the same way, so a view's pk always begins with
//! the full ordered pk of its base.

use std::collections::HashSet;

use strata_common::error::{CatalogResult, SchemaError};
use strata_common::schema::{
    CacheFrequency, ColumnDefinition, EntityDefinition, EntityKind,
};
use strata_common::types::{ColumnName, DdlTimestamp, EntityId};

use crate::statement::{CreateStatement, DeclaredColumn};

/// Delta between a stored definition and a declared column set.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDelta {
    /// Declared shape is already covered by the stored definition.
    Unchanged,
    /// Declaration adds columns and/or pk components.
    Extended {
        merged: EntityDefinition,
        added_columns: Vec<ColumnDefinition>,
        added_pk: Vec<ColumnName>,
    },
    /// Declaration omits stored columns of a non-append-only entity.
    /// Never produced for append-only entities; those reject instead.
    Diverged { missing: Vec<ColumnName> },
}

fn check_duplicates(identity: &EntityId, declared: &[DeclaredColumn]) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    for column in declared {
        if !seen.insert(&column.name) {
            return Err(SchemaError::DuplicateColumn {
                identity: identity.clone(),
                column: column.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn check_compatible(
    identity: &EntityId,
    existing: &ColumnDefinition,
    declared: &DeclaredColumn,
) -> CatalogResult<()> {
    if existing.sql_type != declared.sql_type {
        return Err(SchemaError::TypeMismatch {
            identity: identity.clone(),
            column: declared.name.clone(),
            expected: existing.sql_type,
            actual: declared.sql_type,
        }
        .into());
    }
    if existing.nullable != declared.nullable {
        return Err(SchemaError::NullabilityMismatch {
            identity: identity.clone(),
            column: declared.name.clone(),
        }
        .into());
    }
    Ok(())
}

/// Append new columns to a definition, allocating ordinals past the
/// highest existing one. The caller guarantees the names are new.
fn append_columns(
    old: &EntityDefinition,
    new_columns: &[&DeclaredColumn],
    added_pk: &[ColumnName],
) -> (EntityDefinition, Vec<ColumnDefinition>) {
    let mut merged = old.clone();
    let mut ordinal = old.max_ordinal() + 1;
    let mut added = Vec::with_capacity(new_columns.len());
    for column in new_columns {
        let definition = ColumnDefinition {
            name: column.name.clone(),
            sql_type: column.sql_type,
            nullable: column.nullable,
            is_pk: added_pk.contains(&column.name),
            ordinal_position: ordinal,
        };
        ordinal += 1;
        merged.columns.push(definition.clone());
        added.push(definition);
    }
    merged.pk_columns.extend(added_pk.iter().cloned());
    (merged, added)
}

/// Compute the delta between a stored definition and a re-declaration of
/// the entity. Declared columns are the entity's own; a view never
/// re-declares its inherited base prefix.
pub fn evolve(
    old: &EntityDefinition,
    declared: &[DeclaredColumn],
    declared_pk: &[ColumnName],
) -> CatalogResult<SchemaDelta> {
    check_duplicates(&old.identity, declared)?;

    let mut new_columns = Vec::new();
    for column in declared {
        match old.find_column(&column.name) {
            Some(existing) => check_compatible(&old.identity, existing, column)?,
            None => new_columns.push(column),
        }
    }

    let declared_names: HashSet<&ColumnName> = declared.iter().map(|c| &c.name).collect();
    let missing: Vec<ColumnName> = old
        .own_columns()
        .iter()
        .filter(|c| !declared_names.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();
    if let Some(first) = missing.first() {
        if old.append_only {
            return Err(SchemaError::ColumnRemoved {
                identity: old.identity.clone(),
                column: first.clone(),
            }
            .into());
        }
        return Ok(SchemaDelta::Diverged { missing });
    }

    let new_names: HashSet<&ColumnName> = new_columns.iter().map(|c| &c.name).collect();
    let added_pk: Vec<ColumnName> = declared_pk
        .iter()
        .filter(|name| !old.pk_columns.contains(*name) && new_names.contains(*name))
        .cloned()
        .collect();

    if new_columns.is_empty() {
        return Ok(SchemaDelta::Unchanged);
    }

    let (merged, added_columns) = append_columns(old, &new_columns, &added_pk);
    Ok(SchemaDelta::Extended {
        merged,
        added_columns,
        added_pk,
    })
}

/// ALTER-style evolution: every declared column must be new.
pub fn evolve_additive(
    old: &EntityDefinition,
    declared: &[DeclaredColumn],
    declared_pk: &[ColumnName],
) -> CatalogResult<(EntityDefinition, Vec<ColumnDefinition>, Vec<ColumnName>)> {
    check_duplicates(&old.identity, declared)?;
    for column in declared {
        if old.find_column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn {
                identity: old.identity.clone(),
                column: column.name.clone(),
            }
            .into());
        }
    }
    let declared_names: HashSet<&ColumnName> = declared.iter().map(|c| &c.name).collect();
    for name in declared_pk {
        if !declared_names.contains(name) {
            return Err(SchemaError::UnknownColumn {
                identity: old.identity.clone(),
                column: name.clone(),
            }
            .into());
        }
    }
    let new_columns: Vec<&DeclaredColumn> = declared.iter().collect();
    let (merged, added) = append_columns(old, &new_columns, declared_pk);
    Ok((merged, added, declared_pk.to_vec()))
}

/// Statement-local validation, run before any round trip.
pub fn validate_declaration(
    stmt: &CreateStatement,
    effective_frequency: CacheFrequency,
) -> CatalogResult<()> {
    check_duplicates(&stmt.identity, &stmt.columns)?;
    for name in &stmt.pk {
        if !stmt.columns.iter().any(|c| &c.name == name) {
            return Err(SchemaError::UnknownColumn {
                identity: stmt.identity.clone(),
                column: name.clone(),
            }
            .into());
        }
    }
    if stmt.props.append_only && !effective_frequency.is_bounded() {
        return Err(SchemaError::InvalidCacheConfig {
            identity: stmt.identity.clone(),
        }
        .into());
    }
    if stmt.kind == EntityKind::View && stmt.parent.is_none() {
        return Err(SchemaError::MissingParent {
            identity: stmt.identity.clone(),
        }
        .into());
    }
    Ok(())
}

/// The append-only flag propagates down the hierarchy: a view over an
/// append-only base must itself declare the flag. The reverse is
/// permitted.
pub fn validate_view_props(stmt: &CreateStatement, base: &EntityDefinition) -> CatalogResult<()> {
    if base.append_only && !stmt.props.append_only {
        return Err(SchemaError::ViewNotAppendOnly {
            view: stmt.identity.clone(),
            base: base.identity.clone(),
        }
        .into());
    }
    Ok(())
}

/// Definition for a brand-new base table.
pub fn build_table_definition(
    stmt: &CreateStatement,
    refresh_interval: CacheFrequency,
) -> EntityDefinition {
    let columns = stmt
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| ColumnDefinition {
            name: column.name.clone(),
            sql_type: column.sql_type,
            nullable: column.nullable,
            is_pk: stmt.pk.contains(&column.name),
            ordinal_position: idx as u32,
        })
        .collect();
    EntityDefinition {
        identity: stmt.identity.clone(),
        kind: EntityKind::BaseTable,
        parent: None,
        columns,
        pk_columns: stmt.pk.clone(),
        base_column_count: 0,
        append_only: stmt.props.append_only,
        refresh_interval,
        auto_partition_sequence: stmt.props.auto_partition_seq.clone(),
        last_ddl_timestamp: DdlTimestamp(1),
    }
}

/// Definition for a brand-new view: the base's columns first, then the
/// view's own in declaration order; pk is the base's pk followed by the
/// view's own pk constraint.
pub fn build_view_definition(
    base: &EntityDefinition,
    stmt: &CreateStatement,
    refresh_interval: CacheFrequency,
) -> CatalogResult<EntityDefinition> {
    for column in &stmt.columns {
        if base.find_column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn {
                identity: stmt.identity.clone(),
                column: column.name.clone(),
            }
            .into());
        }
    }

    let mut columns = base.columns.clone();
    let mut ordinal = base.max_ordinal() + 1;
    for column in &stmt.columns {
        columns.push(ColumnDefinition {
            name: column.name.clone(),
            sql_type: column.sql_type,
            nullable: column.nullable,
            is_pk: stmt.pk.contains(&column.name),
            ordinal_position: ordinal,
        });
        ordinal += 1;
    }

    let mut pk_columns = base.pk_columns.clone();
    for name in &stmt.pk {
        if !pk_columns.contains(name) {
            pk_columns.push(name.clone());
        }
    }

    Ok(EntityDefinition {
        identity: stmt.identity.clone(),
        kind: EntityKind::View,
        parent: Some(base.identity.clone()),
        columns,
        pk_columns,
        base_column_count: base.columns.len(),
        append_only: stmt.props.append_only,
        refresh_interval,
        auto_partition_sequence: None,
        last_ddl_timestamp: DdlTimestamp(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::error::{CatalogError, SchemaError};
    use strata_common::types::DataType;

    fn base_table() -> EntityDefinition {
        let stmt = CreateStatement::base_table(
            "metric_table",
            vec![
                DeclaredColumn::new("metricId", DataType::Int32, false),
                DeclaredColumn::new("metricVal", DataType::Float64, true),
            ],
            &["metricId"],
        );
        build_table_definition(&stmt, CacheFrequency::Millis(1))
    }

    fn view_stmt(columns: Vec<DeclaredColumn>, pk: &[&str]) -> CreateStatement {
        let mut stmt = CreateStatement::view("view1", "metric_table", columns, pk);
        stmt.props.append_only = true;
        stmt
    }

    fn view_over_base() -> EntityDefinition {
        let stmt = view_stmt(
            vec![DeclaredColumn::new("hostName", DataType::Varchar, false)],
            &["hostName"],
        );
        build_view_definition(&base_table(), &stmt, CacheFrequency::Millis(300_000)).unwrap()
    }

    fn names(columns: &[ColumnDefinition]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn table_definition_orders_columns_as_declared() {
        let def = base_table();
        assert_eq!(names(&def.columns), vec!["METRICID", "METRICVAL"]);
        assert_eq!(def.columns[0].ordinal_position, 0);
        assert!(def.columns[0].is_pk);
        assert_eq!(def.pk_columns, vec![ColumnName::new("metricId")]);
        assert_eq!(def.last_ddl_timestamp, DdlTimestamp(1));
    }

    #[test]
    fn view_inherits_base_columns_and_pk_prefix() {
        let def = view_over_base();
        assert_eq!(names(&def.columns), vec!["METRICID", "METRICVAL", "HOSTNAME"]);
        assert_eq!(
            def.pk_columns,
            vec![ColumnName::new("metricId"), ColumnName::new("hostName")]
        );
        assert_eq!(def.base_column_count, 2);
        assert_eq!(def.columns[2].ordinal_position, 2);
    }

    #[test]
    fn view_cannot_shadow_base_column() {
        let stmt = view_stmt(
            vec![DeclaredColumn::new("metricVal", DataType::Float64, true)],
            &[],
        );
        let err = build_view_definition(&base_table(), &stmt, CacheFrequency::Millis(1))
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn identical_redeclaration_is_unchanged() {
        let view = view_over_base();
        let delta = evolve(
            &view,
            &[DeclaredColumn::new("hostName", DataType::Varchar, false)],
            &[ColumnName::new("hostName")],
        )
        .unwrap();
        assert_eq!(delta, SchemaDelta::Unchanged);
    }

    #[test]
    fn redeclaration_appends_new_pk_and_regular_columns() {
        // existing view: columns [A,B,H], pk [A,H]; declare H plus new pk I
        // and regular N
        let view = view_over_base();
        let delta = evolve(
            &view,
            &[
                DeclaredColumn::new("hostName", DataType::Varchar, false),
                DeclaredColumn::new("instanceName", DataType::Varchar, false),
                DeclaredColumn::new("metricVal2", DataType::Float64, true),
            ],
            &[ColumnName::new("hostName"), ColumnName::new("instanceName")],
        )
        .unwrap();

        let SchemaDelta::Extended {
            merged,
            added_columns,
            added_pk,
        } = delta
        else {
            panic!("expected Extended delta");
        };
        assert_eq!(
            names(&merged.columns),
            vec!["METRICID", "METRICVAL", "HOSTNAME", "INSTANCENAME", "METRICVAL2"]
        );
        assert_eq!(
            merged.pk_columns,
            vec![
                ColumnName::new("metricId"),
                ColumnName::new("hostName"),
                ColumnName::new("instanceName"),
            ]
        );
        assert_eq!(names(&added_columns), vec!["INSTANCENAME", "METRICVAL2"]);
        assert_eq!(added_pk, vec![ColumnName::new("instanceName")]);
        // ordinals continue past the highest existing position
        assert_eq!(added_columns[0].ordinal_position, 3);
        assert_eq!(added_columns[1].ordinal_position, 4);
        assert!(added_columns[0].is_pk);
        assert!(!added_columns[1].is_pk);
    }

    #[test]
    fn second_evolution_keeps_appending_in_order() {
        let view = view_over_base();
        let first = evolve(
            &view,
            &[
                DeclaredColumn::new("hostName", DataType::Varchar, false),
                DeclaredColumn::new("instanceName", DataType::Varchar, false),
                DeclaredColumn::new("metricVal2", DataType::Float64, true),
            ],
            &[ColumnName::new("hostName"), ColumnName::new("instanceName")],
        )
        .unwrap();
        let SchemaDelta::Extended { merged, .. } = first else {
            panic!("expected Extended delta");
        };

        let second = evolve(
            &merged,
            &[
                DeclaredColumn::new("hostName", DataType::Varchar, false),
                DeclaredColumn::new("instanceName", DataType::Varchar, false),
                DeclaredColumn::new("metricVal2", DataType::Float64, true),
                DeclaredColumn::new("zoneName", DataType::Varchar, false),
                DeclaredColumn::new("metricVal3", DataType::Float64, true),
            ],
            &[
                ColumnName::new("hostName"),
                ColumnName::new("instanceName"),
                ColumnName::new("zoneName"),
            ],
        )
        .unwrap();
        let SchemaDelta::Extended { merged, .. } = second else {
            panic!("expected Extended delta");
        };
        assert_eq!(
            names(&merged.columns),
            vec![
                "METRICID",
                "METRICVAL",
                "HOSTNAME",
                "INSTANCENAME",
                "METRICVAL2",
                "ZONENAME",
                "METRICVAL3",
            ]
        );
        assert_eq!(
            merged.pk_columns,
            vec![
                ColumnName::new("metricId"),
                ColumnName::new("hostName"),
                ColumnName::new("instanceName"),
                ColumnName::new("zoneName"),
            ]
        );
    }

    #[test]
    fn omitting_a_column_from_an_append_only_entity_is_rejected() {
        let view = view_over_base();
        // view owns HOSTNAME; declaring only a fresh column omits it
        let err = evolve(
            &view,
            &[DeclaredColumn::new("metricVal2", DataType::Float64, true)],
            &[],
        )
        .unwrap_err();
        match err {
            CatalogError::Schema(SchemaError::ColumnRemoved { column, .. }) => {
                assert_eq!(column.as_str(), "HOSTNAME");
            }
            other => panic!("expected ColumnRemoved, got {other}"),
        }
    }

    #[test]
    fn omission_on_mutable_entity_is_divergence_not_error() {
        let mut table = base_table();
        table.append_only = false;
        let delta = evolve(
            &table,
            &[DeclaredColumn::new("metricId", DataType::Int32, false)],
            &[ColumnName::new("metricId")],
        )
        .unwrap();
        assert_eq!(
            delta,
            SchemaDelta::Diverged {
                missing: vec![ColumnName::new("metricVal")]
            }
        );
    }

    #[test]
    fn type_change_on_existing_column_is_rejected() {
        let table = base_table();
        let err = evolve(
            &table,
            &[
                DeclaredColumn::new("metricId", DataType::Int64, false),
                DeclaredColumn::new("metricVal", DataType::Float64, true),
            ],
            &[ColumnName::new("metricId")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn nullability_change_on_existing_column_is_rejected() {
        let table = base_table();
        let err = evolve(
            &table,
            &[
                DeclaredColumn::new("metricId", DataType::Int32, false),
                DeclaredColumn::new("metricVal", DataType::Float64, false),
            ],
            &[ColumnName::new("metricId")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::NullabilityMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_declared_column_is_rejected() {
        let table = base_table();
        let err = evolve(
            &table,
            &[
                DeclaredColumn::new("metricId", DataType::Int32, false),
                DeclaredColumn::new("metricVal", DataType::Float64, true),
                DeclaredColumn::new("METRICVAL", DataType::Float64, true),
            ],
            &[ColumnName::new("metricId")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn additive_evolution_rejects_existing_columns() {
        let table = base_table();
        let err = evolve_additive(
            &table,
            &[DeclaredColumn::new("metricVal", DataType::Float64, true)],
            &[],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::DuplicateColumn { .. })
        ));

        let (merged, added, _) = evolve_additive(
            &table,
            &[DeclaredColumn::new("metricVal2", DataType::Float64, true)],
            &[],
        )
        .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(names(&merged.columns), vec!["METRICID", "METRICVAL", "METRICVAL2"]);
    }

    #[test]
    fn additive_pk_must_name_a_declared_column() {
        let table = base_table();
        let err = evolve_additive(
            &table,
            &[DeclaredColumn::new("metricVal2", DataType::Float64, true)],
            &[ColumnName::new("missing")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn append_only_demands_bounded_cache_frequency() {
        let mut stmt = CreateStatement::base_table(
            "test1",
            vec![DeclaredColumn::new("id", DataType::Char(1), false)],
            &["id"],
        );
        stmt.props.append_only = true;
        let err = validate_declaration(&stmt, CacheFrequency::Always).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::InvalidCacheConfig { .. })
        ));
        validate_declaration(&stmt, CacheFrequency::Millis(1_000)).unwrap();
    }

    #[test]
    fn append_only_flag_propagates_to_views() {
        let mut base = base_table();
        base.append_only = true;
        let mut stmt = view_stmt(
            vec![DeclaredColumn::new("val1", DataType::Int32, false)],
            &["val1"],
        );
        stmt.props.append_only = false;
        let err = validate_view_props(&stmt, &base).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::ViewNotAppendOnly { .. })
        ));

        // the reverse is permitted: append-only view over a mutable base
        base.append_only = false;
        stmt.props.append_only = true;
        validate_view_props(&stmt, &base).unwrap();
    }

    #[test]
    fn pk_constraint_must_name_declared_columns() {
        let stmt = CreateStatement::base_table(
            "t",
            vec![DeclaredColumn::new("a", DataType::Int32, false)],
            &["a", "b"],
        );
        let err = validate_declaration(&stmt, CacheFrequency::Millis(1)).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::UnknownColumn { .. })
        ));
    }
}
