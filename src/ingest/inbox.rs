use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use jiff::Timestamp;
use lazy_static::lazy_static;
use log::{error, warn};
use regex::Regex;
use serde_json::{Map, Value};

use crate::ingest::dataset::table_for;

lazy_static! {
    /// Message files are named by message id by the feed writer, one JSON
    /// object per file, optionally gzipped once aged.
    static ref MESSAGE_FILE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*\.json(\.gz)?$").unwrap();
}

/// One parsed message together with the file it came from.  The path is kept
/// so the file can be deleted once the row is durably inserted.
#[derive(Debug, Clone)]
pub struct ScannedRecord {
    pub dataset: String,
    pub row: Map<String, Value>,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// Valid records grouped by destination table.
    pub by_table: BTreeMap<String, Vec<ScannedRecord>>,
    pub files_examined: usize,
    pub poison_dropped: usize,
}

/// The on-disk inbox, one subdirectory per IRIS topic.
#[derive(Debug, Clone)]
pub struct Inbox {
    pub root: PathBuf,
}

impl Inbox {
    pub fn new<P: Into<PathBuf>>(root: P) -> Inbox {
        Inbox { root: root.into() }
    }

    /// Walk the inbox and parse at most `max_files` message files.  Fails
    /// only if the inbox root itself cannot be read; everything below that
    /// is handled per file.
    pub fn scan(&self, max_files: usize) -> Result<ScanResult, io::Error> {
        let mut result = ScanResult::default();
        let mut subdirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();

        'outer: for subdir in subdirs {
            let dataset = match subdir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let table = match table_for(&dataset) {
                Some(table) => table,
                None => {
                    warn!("no table mapped for inbox directory {}, skipping", dataset);
                    continue;
                }
            };

            let mut paths: Vec<PathBuf> = match fs::read_dir(&subdir) {
                Ok(entries) => entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| is_message_file(p))
                    .collect(),
                Err(e) => {
                    warn!("cannot list {}: {}", subdir.display(), e);
                    continue;
                }
            };
            paths.sort();

            for path in paths {
                if result.files_examined >= max_files {
                    break 'outer;
                }
                result.files_examined += 1;

                let bytes = match fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // transient, leave the file for the next cycle
                        warn!("cannot read {}: {}", path.display(), e);
                        continue;
                    }
                };
                match parse_message(&path, &bytes) {
                    Some(mut row) => {
                        row.insert("_dataset".to_string(), Value::String(dataset.clone()));
                        row.insert(
                            "_ingested_utc".to_string(),
                            Value::String(Timestamp::now().to_string()),
                        );
                        result
                            .by_table
                            .entry(table.to_string())
                            .or_default()
                            .push(ScannedRecord {
                                dataset: dataset.clone(),
                                row,
                                path,
                            });
                    }
                    None => {
                        // poison message, drop it for good
                        error!("unparseable message {}, deleting", path.display());
                        result.poison_dropped += 1;
                        if let Err(e) = fs::remove_file(&path) {
                            warn!("failed to delete poison file {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }
        Ok(result)
    }
}

fn is_message_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| MESSAGE_FILE.is_match(name))
}

/// Decode one message file into a JSON object.  `None` means the content is
/// malformed (bad gzip, bad JSON, or a JSON value that is not an object).
fn parse_message(path: &Path, bytes: &[u8]) -> Option<Map<String, Value>> {
    let text = if path.extension().is_some_and(|e| e == "gz") {
        let mut buffer = String::new();
        GzDecoder::new(bytes).read_to_string(&mut buffer).ok()?;
        buffer
    } else {
        String::from_utf8(bytes.to_vec()).ok()?
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
