use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalize an unquoted SQL identifier: trim and uppercase.
/// `metricId`, `METRICID` and ` metricid ` all name the same column.
fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Qualified name of a table or view, unique within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub schema: Option<String>,
    pub name: String,
}

impl EntityId {
    pub fn new(name: &str) -> Self {
        Self {
            schema: None,
            name: normalize(name),
        }
    }

    pub fn qualified(schema: &str, name: &str) -> Self {
        Self {
            schema: Some(normalize(schema)),
            name: normalize(name),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Qualified name of a sequence, same normalization rules as [`EntityId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId {
    pub schema: Option<String>,
    pub name: String,
}

impl SequenceId {
    pub fn new(name: &str) -> Self {
        Self {
            schema: None,
            name: normalize(name),
        }
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "seq:{}.{}", schema, self.name),
            None => write!(f, "seq:{}", self.name),
        }
    }
}

/// Case-normalized column identifier, unique within an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version stamp of an entity definition. Bumped on every accepted
/// mutation; strictly increasing, never wall-clock derived.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct DdlTimestamp(pub u64);

impl DdlTimestamp {
    pub const MIN: DdlTimestamp = DdlTimestamp(0);

    pub fn next(self) -> DdlTimestamp {
        DdlTimestamp(self.0 + 1)
    }
}

impl fmt::Display for DdlTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ddl:{}", self.0)
    }
}

/// SQL data types recognized by the catalog surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float64,
    Varchar,
    Char(u32),
    Timestamp,
    Date,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int32 => write!(f, "INTEGER"),
            DataType::Int64 => write!(f, "BIGINT"),
            DataType::Float64 => write!(f, "DOUBLE"),
            DataType::Varchar => write!(f, "VARCHAR"),
            DataType::Char(len) => write!(f, "CHAR({})", len),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Date => write!(f, "DATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_normalizes_case() {
        assert_eq!(EntityId::new("metric_table"), EntityId::new("METRIC_table"));
        assert_eq!(EntityId::new(" view1 ").name, "VIEW1");
    }

    #[test]
    fn entity_id_display_includes_schema() {
        assert_eq!(EntityId::qualified("s", "t").to_string(), "S.T");
        assert_eq!(EntityId::new("t").to_string(), "T");
    }

    #[test]
    fn column_name_normalizes_case() {
        assert_eq!(ColumnName::new("metricId").as_str(), "METRICID");
        assert_eq!(ColumnName::new("hostName"), ColumnName::new("HOSTNAME"));
    }

    #[test]
    fn ddl_timestamp_is_strictly_increasing() {
        let ts = DdlTimestamp::MIN;
        assert!(ts.next() > ts);
        assert_eq!(ts.next().next(), DdlTimestamp(2));
    }

    #[test]
    fn data_type_display() {
        assert_eq!(DataType::Int32.to_string(), "INTEGER");
        assert_eq!(DataType::Char(2).to_string(), "CHAR(2)");
    }
}
