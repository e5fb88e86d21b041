use std::io;
use std::thread;
use std::time::Duration;

use log::{error, info};
use serde::Serialize;

use crate::db::warehouse::Warehouse;
use crate::ingest::batch::{split_into_chunks, Chunk};
use crate::ingest::inbox::Inbox;
use crate::ingest::inserter::insert_chunk;
use crate::ingest::schema::reconcile_schema;

#[derive(Debug, Default, Serialize)]
pub struct CycleStats {
    pub files_examined: usize,
    pub poison_dropped: usize,
    pub chunks_committed: usize,
    pub chunks_failed: usize,
    pub rows_inserted: usize,
    pub files_deleted: usize,
}

/// The scan → batch → reconcile → insert cycle over one inbox and one
/// warehouse.  Strictly sequential; the only suspension is the sleep
/// between cycles.
pub struct IrisUploader<W: Warehouse> {
    pub inbox: Inbox,
    pub warehouse: W,
    pub max_files_per_cycle: usize,
    pub max_batch_size: usize,
    pub sleep: Duration,
}

impl<W: Warehouse> IrisUploader<W> {
    /// Run one full cycle.  Fails only when the inbox root itself is
    /// unreadable; any failure below that stays confined to its own chunk so
    /// one table's bad data cannot block another table's ingestion.
    pub fn run_cycle(&self) -> Result<CycleStats, io::Error> {
        let scan = self.inbox.scan(self.max_files_per_cycle)?;
        let mut stats = CycleStats {
            files_examined: scan.files_examined,
            poison_dropped: scan.poison_dropped,
            ..Default::default()
        };

        let mut chunks: Vec<Chunk> = Vec::new();
        for (table, records) in scan.by_table {
            chunks.extend(split_into_chunks(&table, records, self.max_batch_size));
        }

        for chunk in &chunks {
            if let Err(e) = reconcile_schema(&self.warehouse, &chunk.table, &chunk.rows) {
                // keep going with the stale schema, the insert will report it
                error!("schema extension of {} failed: {}", chunk.table, e);
            }
            let outcome = insert_chunk(&self.warehouse, chunk);
            if outcome.committed {
                stats.chunks_committed += 1;
                stats.rows_inserted += chunk.rows.len();
                stats.files_deleted += outcome.files_deleted;
            } else {
                stats.chunks_failed += 1;
            }
        }
        Ok(stats)
    }

    /// Run cycles until the process is interrupted, sleeping the configured
    /// interval in between.
    pub fn run_forever(&self) -> Result<(), io::Error> {
        loop {
            let stats = self.run_cycle()?;
            info!("cycle done: {:?}, sleeping {:?}", stats, self.sleep);
            thread::sleep(self.sleep);
        }
    }
}
