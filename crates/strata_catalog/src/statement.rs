//! Statement surface consumed from the SQL layer.
//!
//! The parser and planner live outside this engine; statements arrive
//! already shaped. Identifiers are normalized on construction so every
//! later comparison is by canonical name.

use strata_common::schema::{CacheFrequency, EntityKind};
use strata_common::types::{ColumnName, DataType, EntityId, SequenceId};

/// One column as declared in a CREATE or ALTER statement. Whether it is
/// part of the primary key is carried by the statement's pk constraint,
/// not the column itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredColumn {
    pub name: ColumnName,
    pub sql_type: DataType,
    pub nullable: bool,
}

impl DeclaredColumn {
    pub fn new(name: &str, sql_type: DataType, nullable: bool) -> Self {
        Self {
            name: ColumnName::new(name),
            sql_type,
            nullable,
        }
    }
}

/// Attributes recognized on a CREATE statement:
/// `APPEND_ONLY_SCHEMA`, `UPDATE_CACHE_FREQUENCY`, `AUTO_PARTITION_SEQ`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityProps {
    pub append_only: bool,
    /// `None` falls back to the factory-wide default.
    pub update_cache_frequency: Option<CacheFrequency>,
    pub auto_partition_seq: Option<SequenceId>,
}

/// CREATE TABLE / CREATE VIEW as seen by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatement {
    pub identity: EntityId,
    pub kind: EntityKind,
    /// Base entity, required for views.
    pub parent: Option<EntityId>,
    /// The entity's own columns; a view never re-declares its base's.
    pub columns: Vec<DeclaredColumn>,
    /// PK constraint in declaration order, naming declared columns.
    pub pk: Vec<ColumnName>,
    pub if_not_exists: bool,
    pub props: EntityProps,
}

impl CreateStatement {
    pub fn base_table(name: &str, columns: Vec<DeclaredColumn>, pk: &[&str]) -> Self {
        Self {
            identity: EntityId::new(name),
            kind: EntityKind::BaseTable,
            parent: None,
            columns,
            pk: pk.iter().map(|c| ColumnName::new(c)).collect(),
            if_not_exists: false,
            props: EntityProps::default(),
        }
    }

    pub fn view(name: &str, parent: &str, columns: Vec<DeclaredColumn>, pk: &[&str]) -> Self {
        Self {
            identity: EntityId::new(name),
            kind: EntityKind::View,
            parent: Some(EntityId::new(parent)),
            columns,
            pk: pk.iter().map(|c| ColumnName::new(c)).collect(),
            if_not_exists: false,
            props: EntityProps::default(),
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn with_props(mut self, props: EntityProps) -> Self {
        self.props = props;
        self
    }
}

/// ALTER ... ADD column statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterAddColumns {
    pub identity: EntityId,
    pub columns: Vec<DeclaredColumn>,
    /// Declared columns that extend the primary key, in order.
    pub pk: Vec<ColumnName>,
}

impl AlterAddColumns {
    pub fn new(identity: &str, columns: Vec<DeclaredColumn>) -> Self {
        Self {
            identity: EntityId::new(identity),
            columns,
            pk: Vec::new(),
        }
    }
}

/// ALTER ... DROP COLUMN statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropColumn {
    pub identity: EntityId,
    pub column: ColumnName,
}

impl DropColumn {
    pub fn new(identity: &str, column: &str) -> Self {
        Self {
            identity: EntityId::new(identity),
            column: ColumnName::new(column),
        }
    }
}
