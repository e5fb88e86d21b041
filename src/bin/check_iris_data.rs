use std::error::Error;
use std::path::Path;

use clap::Parser;
use iris_pipeline::db::prod_db::ProdDb;
use iris_pipeline::ingest::dataset::DATASET_TABLES;
use jiff::Timestamp;
use tabled::{Table, Tabled};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,
}

#[derive(Tabled)]
struct FreshnessRow {
    dataset: &'static str,
    table: &'static str,
    rows: u64,
    last_ingested: String,
    age: String,
    status: String,
}

/// Ingestion is healthy when every table saw data in the last 10 minutes.
fn status_for_age(age_min: i64) -> &'static str {
    if age_min < 10 {
        "OK"
    } else if age_min <= 30 {
        "LAGGING"
    } else {
        "STALE"
    }
}

/// Freshness report over all mapped tables.  A growing age is the visible
/// symptom of a stuck uploader or a persistent schema problem.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .init();

    dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str())).ok();

    let db = ProdDb::iris_duckdb();
    db.ensure_reachable()?;
    let now = Timestamp::now();

    let mut report: Vec<FreshnessRow> = Vec::new();
    for (&dataset, &table) in DATASET_TABLES.iter() {
        let row = match db.table_freshness(table)? {
            None => FreshnessRow {
                dataset,
                table,
                rows: 0,
                last_ingested: "-".to_string(),
                age: "-".to_string(),
                status: "MISSING".to_string(),
            },
            Some(freshness) => match freshness.last_ingested {
                None => FreshnessRow {
                    dataset,
                    table,
                    rows: freshness.row_count,
                    last_ingested: "-".to_string(),
                    age: "-".to_string(),
                    status: "NO DATA".to_string(),
                },
                Some(last) => {
                    let age_min = (now.as_second() - last.as_second()) / 60;
                    FreshnessRow {
                        dataset,
                        table,
                        rows: freshness.row_count,
                        last_ingested: last.to_string(),
                        age: format!("{} min", age_min),
                        status: status_for_age(age_min).to_string(),
                    }
                }
            },
        };
        report.push(row);
    }

    println!("{}", Table::new(report));
    Ok(())
}
