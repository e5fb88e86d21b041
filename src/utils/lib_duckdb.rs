use std::time::Duration;

use duckdb::{AccessMode, Config, Connection};
use log::warn;

const MAX_ATTEMPTS: u32 = 8;
const INITIAL_WAIT: Duration = Duration::from_millis(25);

/// `AccessMode` does not implement `Clone`, so reconstruct the same variant
/// for each retry attempt.
fn same_mode(mode: &AccessMode) -> AccessMode {
    match mode {
        AccessMode::Automatic => AccessMode::Automatic,
        AccessMode::ReadOnly => AccessMode::ReadOnly,
        AccessMode::ReadWrite => AccessMode::ReadWrite,
    }
}

/// Open a DuckDB connection, retrying with exponential backoff.  The uploader
/// and the freshness checker share one database file, so opens can hit the
/// file lock.
pub fn open_with_retry(
    duckdb_path: &str,
    access_mode: AccessMode,
) -> Result<Connection, duckdb::Error> {
    let mut attempts = 0;
    let mut wait = INITIAL_WAIT;

    loop {
        let config = Config::default().access_mode(same_mode(&access_mode))?;
        match Connection::open_with_flags(duckdb_path, config) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                attempts += 1;
                if attempts >= MAX_ATTEMPTS {
                    return Err(e);
                }
                warn!(
                    "failed to open {} (attempt {}/{}), retrying in {:?}: {}",
                    duckdb_path, attempts, MAX_ATTEMPTS, wait, e
                );
                std::thread::sleep(wait);
                wait *= 2;
            }
        }
    }
}
