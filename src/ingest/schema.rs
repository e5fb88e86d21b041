use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::db::warehouse::{Column, ColumnType, Warehouse, WarehouseError};

/// Infer one column per field name appearing anywhere in the chunk.  When
/// records disagree on a field's apparent type, the inferred type is the
/// least common supertype rather than whichever value happened to come
/// first.
pub fn chunk_columns(rows: &[Map<String, Value>]) -> Vec<Column> {
    let mut types: BTreeMap<&str, ColumnType> = BTreeMap::new();
    for row in rows {
        for (name, value) in row {
            let inferred = ColumnType::of_value(value);
            types
                .entry(name)
                .and_modify(|t| *t = t.promote(inferred))
                .or_insert(inferred);
        }
    }
    types
        .into_iter()
        .map(|(name, data_type)| Column::new(name, data_type))
        .collect()
}

/// Columns present in the chunk but not yet on the table.  An existing
/// column is never retyped, whatever the incoming values look like.
pub fn missing_columns(incoming: &[Column], known: &[Column]) -> Vec<Column> {
    incoming
        .iter()
        .filter(|c| !known.iter().any(|k| k.name == c.name))
        .cloned()
        .collect()
}

/// Make sure `table` accepts every field of the chunk before the insert is
/// attempted.  The known column set is fetched fresh from the warehouse on
/// every call; it is deliberately not cached across cycles so that outside
/// schema changes are picked up.
pub fn reconcile_schema(
    warehouse: &dyn Warehouse,
    table: &str,
    rows: &[Map<String, Value>],
) -> Result<(), WarehouseError> {
    let known = warehouse.table_columns(table)?;
    let new_columns = missing_columns(&chunk_columns(rows), &known);
    if new_columns.is_empty() {
        return Ok(());
    }
    warehouse.add_columns(table, &new_columns)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(values: Vec<Value>) -> Vec<Map<String, Value>> {
        values
            .into_iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn infers_one_column_per_field() {
        let rows = rows(vec![
            json!({"time": "2025-06-01T00:00:00Z", "value": 49.9, "flagged": false}),
            json!({"time": "2025-06-01T00:00:15Z", "detail": {"zone": "B7"}}),
        ]);
        let columns = chunk_columns(&rows);
        assert_eq!(
            columns,
            vec![
                Column::new("detail", ColumnType::Record),
                Column::new("flagged", ColumnType::Boolean),
                Column::new("time", ColumnType::String),
                Column::new("value", ColumnType::Float),
            ]
        );
    }

    #[test]
    fn conflicting_types_promote() {
        let rows = rows(vec![
            json!({"a": 1, "b": 2, "c": true}),
            json!({"a": 1.5, "b": "two", "c": 3}),
        ]);
        let columns = chunk_columns(&rows);
        assert_eq!(
            columns,
            vec![
                Column::new("a", ColumnType::Float),
                Column::new("b", ColumnType::String),
                Column::new("c", ColumnType::String),
            ]
        );
    }

    #[test]
    fn missing_columns_ignores_known_names() {
        let incoming = vec![
            Column::new("a", ColumnType::Integer),
            Column::new("b", ColumnType::Float),
            Column::new("c", ColumnType::String),
        ];
        // a known column keeps its type even if the incoming type differs
        let known = vec![
            Column::new("a", ColumnType::String),
            Column::new("b", ColumnType::Float),
        ];
        assert_eq!(
            missing_columns(&incoming, &known),
            vec![Column::new("c", ColumnType::String)]
        );
        assert!(missing_columns(&incoming, &incoming).is_empty());
    }
}
