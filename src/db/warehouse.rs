use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Column types supported by the warehouse.  Incoming message fields are
/// mapped onto one of these from their runtime JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    /// A nested JSON object, stored as a JSON column.
    Record,
    String,
}

impl ColumnType {
    /// Infer the column type from a field's runtime value.  Arrays, nulls and
    /// anything else without a narrower representation land on String.
    pub fn of_value(value: &Value) -> ColumnType {
        match value {
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Float,
            Value::Object(_) => ColumnType::Record,
            _ => ColumnType::String,
        }
    }

    /// Least common supertype of two inferred types.  Integer widens to Float,
    /// everything else that disagrees widens to String.
    pub fn promote(self, other: ColumnType) -> ColumnType {
        if self == other {
            return self;
        }
        match (self, other) {
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Record => write!(f, "RECORD"),
            ColumnType::String => write!(f, "STRING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, data_type: ColumnType) -> Column {
        Column {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("duckdb: {0}")]
    Duckdb(#[from] duckdb::Error),

    /// The whole chunk is considered failed; `samples` holds the first few
    /// rejected rows for diagnostics.
    #[error("insert into {table} rejected {rejected} of {total} rows: {samples:?}")]
    InsertRejected {
        table: String,
        rejected: usize,
        total: usize,
        samples: Vec<String>,
    },
}

/// The three operations the ingestion loop needs from the warehouse.  The
/// production implementation is DuckDB, see [`crate::db::iris_duckdb`].
pub trait Warehouse {
    /// Current column list of `table`, empty if the table does not exist.
    fn table_columns(&self, table: &str) -> Result<Vec<Column>, WarehouseError>;

    /// Extend `table` with additional nullable columns in one call, creating
    /// the table on demand if it does not exist yet.  Never removes or
    /// retypes an existing column.
    fn add_columns(&self, table: &str, columns: &[Column]) -> Result<(), WarehouseError>;

    /// Bulk-insert `rows` into `table`.  Either all rows commit or the call
    /// returns an error and none do.
    fn insert_rows(&self, table: &str, rows: &[Map<String, Value>]) -> Result<(), WarehouseError>;
}
