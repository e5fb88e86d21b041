use duckdb::types::Value as SqlValue;
use duckdb::{params, params_from_iter, AccessMode};
use itertools::Itertools;
use jiff::Timestamp;
use log::info;
use serde_json::{Map, Value};

use crate::db::warehouse::{Column, ColumnType, Warehouse, WarehouseError};
use crate::utils::lib_duckdb::open_with_retry;

/// How many rejected rows to keep in an insert error for diagnostics.
const MAX_ERROR_SAMPLES: usize = 3;

/// The production warehouse, one DuckDB file holding all `bmrs_*` tables.
#[derive(Clone)]
pub struct IrisDuckdb {
    pub duckdb_path: String,
}

/// Row count and newest ingestion timestamp of one table, for the
/// freshness report.
#[derive(Debug)]
pub struct TableFreshness {
    pub row_count: u64,
    pub last_ingested: Option<Timestamp>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(data_type: ColumnType) -> &'static str {
    match data_type {
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Integer => "BIGINT",
        ColumnType::Float => "DOUBLE",
        ColumnType::Record => "JSON",
        ColumnType::String => "VARCHAR",
    }
}

fn column_type_of_sql(data_type: &str) -> ColumnType {
    match data_type {
        "BOOLEAN" => ColumnType::Boolean,
        "BIGINT" => ColumnType::Integer,
        "DOUBLE" => ColumnType::Float,
        "JSON" => ColumnType::Record,
        _ => ColumnType::String,
    }
}

/// JSON scalar to a DuckDB parameter.  Objects and arrays travel as their
/// JSON text, DuckDB casts to the column type on insert.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::BigInt(i)
            } else if let Some(u) = n.as_u64() {
                SqlValue::HugeInt(u as i128)
            } else {
                SqlValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

impl IrisDuckdb {
    /// Fail fast at startup if the database file cannot be opened at all.
    pub fn ensure_reachable(&self) -> Result<(), WarehouseError> {
        let conn = open_with_retry(&self.duckdb_path, AccessMode::ReadWrite)?;
        conn.query_row("SELECT 1", [], |row| row.get::<usize, i32>(0))?;
        Ok(())
    }

    pub fn table_freshness(&self, table: &str) -> Result<Option<TableFreshness>, WarehouseError> {
        let columns = self.table_columns(table)?;
        if columns.is_empty() {
            return Ok(None);
        }
        let conn = open_with_retry(&self.duckdb_path, AccessMode::ReadOnly)?;
        let has_ingested = columns.iter().any(|c| c.name == "_ingested_utc");
        let sql = if has_ingested {
            format!(
                "SELECT count(*), max(_ingested_utc) FROM {}",
                quote_ident(table)
            )
        } else {
            format!("SELECT count(*), NULL FROM {}", quote_ident(table))
        };
        let (row_count, last) = conn.query_row(&sql, [], |row| {
            Ok((
                row.get::<usize, i64>(0)? as u64,
                row.get::<usize, Option<String>>(1)?,
            ))
        })?;
        let last_ingested = last.and_then(|s| s.parse::<Timestamp>().ok());
        Ok(Some(TableFreshness {
            row_count,
            last_ingested,
        }))
    }
}

impl Warehouse for IrisDuckdb {
    fn table_columns(&self, table: &str) -> Result<Vec<Column>, WarehouseError> {
        let conn = open_with_retry(&self.duckdb_path, AccessMode::ReadOnly)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_name = ?
            ORDER BY ordinal_position;
            "#,
        )?;
        let column_iter = stmt.query_map(params![table], |row| {
            Ok(Column {
                name: row.get::<usize, String>(0)?,
                data_type: column_type_of_sql(&row.get::<usize, String>(1)?),
            })
        })?;
        let columns: Result<Vec<Column>, duckdb::Error> = column_iter.collect();
        Ok(columns?)
    }

    fn add_columns(&self, table: &str, columns: &[Column]) -> Result<(), WarehouseError> {
        if columns.is_empty() {
            return Ok(());
        }
        let conn = open_with_retry(&self.duckdb_path, AccessMode::ReadWrite)?;
        let exists = conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |row| row.get::<usize, i64>(0),
        )? > 0;
        let sql = if exists {
            columns
                .iter()
                .map(|c| {
                    format!(
                        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {};",
                        quote_ident(table),
                        quote_ident(&c.name),
                        sql_type(c.data_type)
                    )
                })
                .join("\n")
        } else {
            // create-on-demand for the first chunk of a new dataset
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({});",
                quote_ident(table),
                columns
                    .iter()
                    .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.data_type)))
                    .join(", ")
            )
        };
        conn.execute_batch(&sql)?;
        info!(
            "extended {} with columns [{}]",
            table,
            columns.iter().map(|c| &c.name).join(", ")
        );
        Ok(())
    }

    fn insert_rows(&self, table: &str, rows: &[Map<String, Value>]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = open_with_retry(&self.duckdb_path, AccessMode::ReadWrite)?;
        let tx = conn.transaction()?;
        let mut rejected: usize = 0;
        let mut samples: Vec<String> = Vec::new();
        for row in rows {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                row.keys().map(|k| quote_ident(k)).join(", "),
                row.values().map(|_| "?").join(", ")
            );
            let values: Vec<SqlValue> = row.values().map(to_sql_value).collect();
            if let Err(e) = tx.execute(&sql, params_from_iter(values.iter())) {
                rejected += 1;
                if samples.len() < MAX_ERROR_SAMPLES {
                    samples.push(format!(
                        "{}: {}",
                        serde_json::to_string(row).unwrap_or_default(),
                        e
                    ));
                }
            }
        }
        if rejected > 0 {
            // dropping the transaction rolls it back, nothing commits
            return Err(WarehouseError::InsertRejected {
                table: table.to_string(),
                rejected,
                total: rows.len(),
                samples,
            });
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn test_db(name: &str) -> IrisDuckdb {
        let path = std::env::temp_dir().join(format!(
            "iris_duckdb_{}_{}.duckdb",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        let db = IrisDuckdb {
            duckdb_path: path.to_str().unwrap().to_string(),
        };
        db.ensure_reachable().unwrap();
        db
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn missing_table_has_no_columns() -> Result<(), WarehouseError> {
        let db = test_db("missing");
        assert!(db.table_columns("bmrs_freq")?.is_empty());
        Ok(())
    }

    #[test]
    fn add_columns_creates_then_extends() -> Result<(), WarehouseError> {
        let db = test_db("extend");
        db.add_columns(
            "bmrs_freq",
            &[
                Column::new("time", ColumnType::String),
                Column::new("value", ColumnType::Float),
            ],
        )?;
        let columns = db.table_columns("bmrs_freq")?;
        assert_eq!(
            columns,
            vec![
                Column::new("time", ColumnType::String),
                Column::new("value", ColumnType::Float),
            ]
        );

        db.add_columns("bmrs_freq", &[Column::new("flagged", ColumnType::Boolean)])?;
        let columns = db.table_columns("bmrs_freq")?;
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[2], Column::new("flagged", ColumnType::Boolean));
        Ok(())
    }

    #[test]
    fn insert_and_read_back() -> Result<(), WarehouseError> {
        let db = test_db("insert");
        db.add_columns(
            "bmrs_freq",
            &[
                Column::new("time", ColumnType::String),
                Column::new("value", ColumnType::Float),
                Column::new("settlement_period", ColumnType::Integer),
                Column::new("payload", ColumnType::Record),
            ],
        )?;
        let rows = vec![
            row(json!({"time": "2025-06-01T00:00:00Z", "value": 49.95,
                "settlement_period": 1, "payload": {"source": "IRIS"}})),
            row(json!({"time": "2025-06-01T00:00:15Z", "value": 50.02})),
        ];
        db.insert_rows("bmrs_freq", &rows)?;

        let freshness = db.table_freshness("bmrs_freq")?.unwrap();
        assert_eq!(freshness.row_count, 2);
        assert!(freshness.last_ingested.is_none()); // no _ingested_utc column here
        Ok(())
    }

    #[test]
    fn rejected_chunk_commits_nothing() -> Result<(), WarehouseError> {
        let db = test_db("reject");
        db.add_columns("bmrs_freq", &[Column::new("value", ColumnType::Float)])?;
        let rows = vec![
            row(json!({"value": 49.9})),
            row(json!({"value": 50.1, "unexpected": "field"})),
        ];
        let err = db.insert_rows("bmrs_freq", &rows).unwrap_err();
        match err {
            WarehouseError::InsertRejected {
                rejected,
                total,
                samples,
                ..
            } => {
                assert_eq!(rejected, 1);
                assert_eq!(total, 2);
                assert_eq!(samples.len(), 1);
            }
            other => panic!("unexpected error {other}"),
        }
        // the valid row must have been rolled back with the chunk
        assert_eq!(db.table_freshness("bmrs_freq")?.unwrap().row_count, 0);
        Ok(())
    }

    #[test]
    fn freshness_reads_ingestion_timestamp() -> Result<(), WarehouseError> {
        let db = test_db("freshness");
        db.add_columns(
            "bmrs_fuelinst_iris",
            &[
                Column::new("mw", ColumnType::Integer),
                Column::new("_ingested_utc", ColumnType::String),
            ],
        )?;
        db.insert_rows(
            "bmrs_fuelinst_iris",
            &[
                row(json!({"mw": 1250, "_ingested_utc": "2025-06-01T10:00:00Z"})),
                row(json!({"mw": 1800, "_ingested_utc": "2025-06-01T10:05:00Z"})),
            ],
        )?;
        let freshness = db.table_freshness("bmrs_fuelinst_iris")?.unwrap();
        assert_eq!(freshness.row_count, 2);
        assert_eq!(
            freshness.last_ingested,
            Some("2025-06-01T10:05:00Z".parse::<Timestamp>().unwrap())
        );
        assert!(db.table_freshness("bmrs_absent")?.is_none());
        Ok(())
    }
}
