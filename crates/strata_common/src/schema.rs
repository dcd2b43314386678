//! The schema model exchanged with the metadata store.
//!
//! An [`EntityDefinition`] is a self-contained snapshot of a base table or
//! view: columns in storage order, the primary-key subsequence, the
//! append-only flag, the cache-refresh budget and the auto-partition
//! sequence reference. Definitions travel by value between the client and
//! the metadata store; nothing in this module talks to the network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ColumnName, DataType, DdlTimestamp, EntityId, SequenceId};

/// How long a cached definition may be trusted before re-validation
/// against the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CacheFrequencyRepr", into = "CacheFrequencyRepr")]
pub enum CacheFrequency {
    /// Never trust the cache; every resolution re-validates.
    Always,
    /// Trust a cached definition while its age is below this many
    /// milliseconds. Zero behaves like `Always` for freshness but remains
    /// a distinct, bounded setting.
    Millis(u64),
}

impl CacheFrequency {
    /// Whether a cache entry of the given age may be used without a
    /// round trip.
    pub fn fresh_within(&self, age_ms: u64) -> bool {
        match self {
            CacheFrequency::Always => false,
            CacheFrequency::Millis(limit) => age_ms < *limit,
        }
    }

    /// `Always` is the unbounded sentinel; everything else is a bounded
    /// refresh budget.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, CacheFrequency::Always)
    }
}

impl fmt::Display for CacheFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFrequency::Always => write!(f, "ALWAYS"),
            CacheFrequency::Millis(ms) => write!(f, "{}", ms),
        }
    }
}

/// Wire/config spelling: either the word `always` or a millisecond count.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CacheFrequencyRepr {
    Millis(u64),
    Word(String),
}

impl TryFrom<CacheFrequencyRepr> for CacheFrequency {
    type Error = String;

    fn try_from(repr: CacheFrequencyRepr) -> Result<Self, Self::Error> {
        match repr {
            CacheFrequencyRepr::Millis(ms) => Ok(CacheFrequency::Millis(ms)),
            CacheFrequencyRepr::Word(word) if word.eq_ignore_ascii_case("always") => {
                Ok(CacheFrequency::Always)
            }
            CacheFrequencyRepr::Word(word) => {
                Err(format!("invalid cache frequency: {:?}", word))
            }
        }
    }
}

impl From<CacheFrequency> for CacheFrequencyRepr {
    fn from(freq: CacheFrequency) -> Self {
        match freq {
            CacheFrequency::Always => CacheFrequencyRepr::Word("always".to_string()),
            CacheFrequency::Millis(ms) => CacheFrequencyRepr::Millis(ms),
        }
    }
}

/// Column definition in an entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: ColumnName,
    pub sql_type: DataType,
    pub nullable: bool,
    pub is_pk: bool,
    /// Physical storage allocation order. Monotonic; never reused.
    pub ordinal_position: u32,
}

/// Whether an entity is physically backed by storage or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    BaseTable,
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::BaseTable => write!(f, "TABLE"),
            EntityKind::View => write!(f, "VIEW"),
        }
    }
}

/// A table or view definition as the catalog knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub identity: EntityId,
    pub kind: EntityKind,
    /// For a view, the identity of its base entity. Never changes after
    /// creation.
    pub parent: Option<EntityId>,
    /// Ordered column sequence. For a view, the base entity's columns come
    /// first, then the view's own columns in the order each was added.
    pub columns: Vec<ColumnDefinition>,
    /// Ordered primary-key subsequence of `columns`, by name. For a view,
    /// always begins with the full ordered pk of its base entity.
    pub pk_columns: Vec<ColumnName>,
    /// Number of leading entries in `columns` inherited from the base
    /// entity; 0 for base tables. Everything at or past this index is the
    /// entity's own and subject to its own evolution rules.
    #[serde(default)]
    pub base_column_count: usize,
    pub append_only: bool,
    pub refresh_interval: CacheFrequency,
    /// When set on a base table, inserts without a value for the leading
    /// pk column draw it from this sequence.
    pub auto_partition_sequence: Option<SequenceId>,
    pub last_ddl_timestamp: DdlTimestamp,
}

impl EntityDefinition {
    pub fn find_column(&self, name: &ColumnName) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| &c.name == name)
    }

    /// Primary-key columns in key order.
    pub fn pk_definitions(&self) -> Vec<&ColumnDefinition> {
        self.pk_columns
            .iter()
            .filter_map(|name| self.find_column(name))
            .collect()
    }

    /// The leading row-key component, if the entity has a primary key.
    pub fn first_pk_column(&self) -> Option<&ColumnDefinition> {
        self.pk_columns.first().and_then(|name| self.find_column(name))
    }

    /// Index of a column within the physical column sequence.
    pub fn column_index(&self, name: &ColumnName) -> Option<usize> {
        self.columns.iter().position(|c| &c.name == name)
    }

    pub fn max_ordinal(&self) -> u32 {
        self.columns
            .iter()
            .map(|c| c.ordinal_position)
            .max()
            .unwrap_or(0)
    }

    /// The columns this entity declared itself (excludes the inherited
    /// base prefix of a view).
    pub fn own_columns(&self) -> &[ColumnDefinition] {
        &self.columns[self.base_column_count.min(self.columns.len())..]
    }

    pub fn is_view(&self) -> bool {
        self.kind == EntityKind::View
    }
}
