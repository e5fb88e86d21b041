use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::ingest::inbox::ScannedRecord;

/// A size-bounded run of records for one destination table, processed as a
/// single insert call.  Paths are parallel to rows.
#[derive(Debug)]
pub struct Chunk {
    pub table: String,
    pub dataset: String,
    pub rows: Vec<Map<String, Value>>,
    pub paths: Vec<PathBuf>,
}

/// Split one table's scanned records into consecutive chunks of at most
/// `max_batch_size` rows.  No reordering, no dedup.
pub fn split_into_chunks(
    table: &str,
    records: Vec<ScannedRecord>,
    max_batch_size: usize,
) -> Vec<Chunk> {
    let max = max_batch_size.max(1);
    let mut chunks: Vec<Chunk> = Vec::new();
    for slice in records.chunks(max) {
        chunks.push(Chunk {
            table: table.to_string(),
            dataset: slice
                .first()
                .map(|r| r.dataset.clone())
                .unwrap_or_default(),
            rows: slice.iter().map(|r| r.row.clone()).collect(),
            paths: slice.iter().map(|r| r.path.clone()).collect(),
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(i: usize) -> ScannedRecord {
        ScannedRecord {
            dataset: "FREQ".to_string(),
            row: json!({"value": i}).as_object().unwrap().clone(),
            path: PathBuf::from(format!("/inbox/FREQ/msg-{i}.json")),
        }
    }

    #[test]
    fn splits_at_batch_size() {
        let records: Vec<ScannedRecord> = (0..5).map(record).collect();
        let chunks = split_into_chunks("bmrs_freq", records, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.rows.len()).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        // order preserved, paths parallel to rows
        assert_eq!(chunks[0].rows[0]["value"], json!(0));
        assert_eq!(chunks[2].paths[0], PathBuf::from("/inbox/FREQ/msg-4.json"));
        assert!(chunks.iter().all(|c| c.table == "bmrs_freq"));
        assert!(chunks.iter().all(|c| c.rows.len() <= 2));
    }

    #[test]
    fn no_records_no_chunks() {
        let chunks = split_into_chunks("bmrs_freq", Vec::new(), 10);
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_batch_size_degrades_to_one() {
        let records: Vec<ScannedRecord> = (0..2).map(record).collect();
        let chunks = split_into_chunks("bmrs_freq", records, 0);
        assert_eq!(chunks.len(), 2);
    }
}
