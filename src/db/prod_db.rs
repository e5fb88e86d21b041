use std::env;
use std::time::Duration;

use log::warn;

use crate::db::iris_duckdb::IrisDuckdb;
use crate::ingest::cycle::IrisUploader;
use crate::ingest::inbox::Inbox;

pub struct ProdDb {}

/// Production wiring.  Paths and limits come from the environment (loaded
/// from `.env/<env>.env` by the binaries) with the deployment defaults
/// below; all values are read once at startup.
impl ProdDb {
    pub fn iris_duckdb() -> IrisDuckdb {
        IrisDuckdb {
            duckdb_path: env_or("IRIS_DUCKDB_PATH", "/opt/iris-pipeline/duckdb/iris.duckdb"),
        }
    }

    pub fn iris_uploader() -> IrisUploader<IrisDuckdb> {
        IrisUploader {
            inbox: Inbox::new(env_or("IRIS_INBOX_DIR", "/opt/iris-pipeline/inbox")),
            warehouse: ProdDb::iris_duckdb(),
            max_files_per_cycle: env_or_usize("IRIS_MAX_FILES_PER_CYCLE", 2000),
            max_batch_size: env_or_usize("IRIS_MAX_BATCH_SIZE", 500),
            sleep: Duration::from_secs(env_or_usize("IRIS_SLEEP_SECS", 300) as u64),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or_usize(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{} is not a number ({}), using {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
