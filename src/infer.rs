use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, parse_boolean, parse_integer, parse_real, parse_timestamp},
    reconcile::MergedDataset,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Integer,
    Float,
    Timestamp,
    Boolean,
    Text,
}

impl StorageType {
    pub fn mysql_type(self) -> &'static str {
        match self {
            StorageType::Integer => "BIGINT",
            StorageType::Float => "DOUBLE",
            StorageType::Timestamp => "DATETIME",
            StorageType::Boolean => "TINYINT(1)",
            StorageType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub storage: StorageType,
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    non_null: usize,
    possible_integer: bool,
    possible_float: bool,
    possible_timestamp: bool,
    possible_boolean: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            non_null: 0,
            possible_integer: true,
            possible_float: true,
            possible_timestamp: true,
            possible_boolean: true,
        }
    }

    fn update(&mut self, value: &Value) {
        if value.is_empty() {
            return;
        }
        self.non_null += 1;
        let (integer, float, timestamp, boolean) = match value {
            Value::Null => return,
            Value::Integer(_) => (true, true, false, false),
            Value::Real(f) => (real_is_integral(*f), true, false, false),
            Value::Timestamp(_) => (false, false, true, false),
            Value::Boolean(_) => (false, false, false, true),
            Value::Text(s) => (
                self.possible_integer && parse_integer(s).is_some(),
                self.possible_float && parse_real(s).is_some(),
                self.possible_timestamp && parse_timestamp(s).is_some(),
                self.possible_boolean && parse_boolean(s).is_some(),
            ),
        };
        self.possible_integer &= integer;
        self.possible_float &= float;
        self.possible_timestamp &= timestamp;
        self.possible_boolean &= boolean;
    }

    fn decide(&self) -> StorageType {
        if self.non_null == 0 {
            StorageType::Text
        } else if self.possible_integer {
            StorageType::Integer
        } else if self.possible_float {
            StorageType::Float
        } else if self.possible_timestamp {
            StorageType::Timestamp
        } else if self.possible_boolean {
            StorageType::Boolean
        } else {
            StorageType::Text
        }
    }
}

fn real_is_integral(value: f64) -> bool {
    value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
}

pub fn infer_storage_type<'a, I>(values: I) -> StorageType
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut candidate = TypeCandidate::new();
    for value in values {
        candidate.update(value);
    }
    candidate.decide()
}

/// Infers one storage type per column across the whole merged dataset.
pub fn infer_columns(dataset: &MergedDataset) -> Vec<ColumnDef> {
    dataset
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnDef {
            name: name.clone(),
            storage: infer_storage_type(dataset.column_values(idx)),
        })
        .collect()
}

/// Converts a cell to the representation matching `storage`. Cells that do
/// not convert are returned unchanged and left for the database to judge.
pub fn coerce(value: Value, storage: StorageType) -> Value {
    if value.is_empty() {
        return Value::Null;
    }
    match (storage, value) {
        (StorageType::Integer, Value::Real(f)) if real_is_integral(f) => Value::Integer(f as i64),
        (StorageType::Integer, Value::Text(s)) => parse_integer(&s)
            .map(Value::Integer)
            .unwrap_or(Value::Text(s)),
        (StorageType::Float, Value::Integer(i)) => Value::Real(i as f64),
        (StorageType::Float, Value::Text(s)) => {
            parse_real(&s).map(Value::Real).unwrap_or(Value::Text(s))
        }
        (StorageType::Timestamp, Value::Text(s)) => parse_timestamp(&s)
            .map(Value::Timestamp)
            .unwrap_or(Value::Text(s)),
        (StorageType::Boolean, Value::Text(s)) => parse_boolean(&s)
            .map(Value::Boolean)
            .unwrap_or(Value::Text(s)),
        (StorageType::Text, Value::Text(s)) => Value::Text(s),
        (StorageType::Text, other) => Value::Text(other.as_display()),
        (_, other) => other,
    }
}

/// Applies [`coerce`] to every cell in place, column by column.
pub fn coerce_rows(rows: &mut [Vec<Value>], columns: &[ColumnDef]) {
    for row in rows.iter_mut() {
        for (cell, column) in row.iter_mut().zip(columns) {
            *cell = coerce(std::mem::take(cell), column.storage);
        }
    }
}
