use std::error::Error;
use std::path::Path;

use clap::Parser;
use iris_pipeline::db::prod_db::ProdDb;
use log::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Environment name, e.g., test, prod
    #[arg(short, long, default_value = "prod")]
    env: String,

    /// Keep running forever, sleeping between cycles.  Without this flag one
    /// cycle is run and the process exits (cron friendly).
    #[arg(long = "loop")]
    run_loop: bool,
}

/// Drains the IRIS inbox into the DuckDB warehouse.  Deployed as the
/// iris-uploader systemd service with --loop.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    dotenvy::from_path(Path::new(format!(".env/{}.env", args.env).as_str())).ok();

    let uploader = ProdDb::iris_uploader();
    info!(
        "starting, inbox {} -> {}",
        uploader.inbox.root.display(),
        uploader.warehouse.duckdb_path
    );
    uploader.warehouse.ensure_reachable()?;

    if args.run_loop {
        uploader.run_forever()?;
    } else {
        let stats = uploader.run_cycle()?;
        info!("cycle done: {}", serde_json::to_string(&stats)?);
    }
    Ok(())
}
