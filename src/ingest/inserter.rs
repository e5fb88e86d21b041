use std::fs;

use log::{error, info};

use crate::db::warehouse::Warehouse;
use crate::ingest::batch::Chunk;

#[derive(Debug, Default)]
pub struct InsertOutcome {
    pub committed: bool,
    pub files_deleted: usize,
}

/// Commit one chunk and, only then, remove the files that produced it.  A
/// failed insert leaves every file in place so the whole chunk is re-scanned
/// next cycle; a failed delete is logged and accepted, the row will simply
/// be inserted again (at-least-once).
pub fn insert_chunk(warehouse: &dyn Warehouse, chunk: &Chunk) -> InsertOutcome {
    match warehouse.insert_rows(&chunk.table, &chunk.rows) {
        Ok(()) => {
            info!(
                "inserted {} rows into {} ({})",
                chunk.rows.len(),
                chunk.table,
                chunk.dataset
            );
            let mut files_deleted = 0;
            for path in &chunk.paths {
                match fs::remove_file(path) {
                    Ok(()) => files_deleted += 1,
                    Err(e) => error!("failed to delete {}: {}", path.display(), e),
                }
            }
            InsertOutcome {
                committed: true,
                files_deleted,
            }
        }
        Err(e) => {
            error!(
                "insert of {} rows into {} failed, files kept for retry: {}",
                chunk.rows.len(),
                chunk.table,
                e
            );
            InsertOutcome {
                committed: false,
                files_deleted: 0,
            }
        }
    }
}
