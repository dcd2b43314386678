use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// A single scalar value as seen by the row-mutation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Varchar(String),
    Timestamp(i64), // microseconds since Unix epoch
    Date(i32),      // days since Unix epoch
}

impl Datum {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Null => None,
            Datum::Boolean(_) => Some(DataType::Boolean),
            Datum::Int32(_) => Some(DataType::Int32),
            Datum::Int64(_) => Some(DataType::Int64),
            Datum::Float64(_) => Some(DataType::Float64),
            Datum::Varchar(_) => Some(DataType::Varchar),
            Datum::Timestamp(_) => Some(DataType::Timestamp),
            Datum::Date(_) => Some(DataType::Date),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int32(v) => Some(*v as i64),
            Datum::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Row values positionally aligned with an entity's column sequence.
/// A `None` slot means the statement did not supply a value for that
/// column; an explicit SQL NULL is `Some(Datum::Null)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Option<Datum>>,
}

impl Row {
    /// An empty row with `width` unset slots.
    pub fn with_width(width: usize) -> Self {
        Self {
            values: vec![None; width],
        }
    }

    pub fn from_values(values: Vec<Option<Datum>>) -> Self {
        Self { values }
    }

    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.values.get(idx).and_then(|slot| slot.as_ref())
    }

    /// True when the statement supplied no value for the slot.
    pub fn is_unset(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), Some(None) | None)
    }

    /// Set a slot, growing the row if the entity has more columns than
    /// the statement supplied.
    pub fn set(&mut self, idx: usize, value: Datum) {
        if self.values.len() <= idx {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(value);
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[Option<Datum>] {
        &self.values
    }
}
