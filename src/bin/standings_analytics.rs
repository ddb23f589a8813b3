use anyhow::{Context, Result};

use mls_standings::config::{PipelineConfig, parse_db_path_arg};
use mls_standings::logging::init_tracing;
use mls_standings::pipeline::rebuild_from_store;
use mls_standings::store::open_db;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env().context("load config")?;
    if let Some(db_path) = parse_db_path_arg(&args) {
        cfg.db_path = db_path;
    }

    let mut conn = open_db(&cfg.db_path)?;
    let summary = rebuild_from_store(&cfg, &mut conn).context("analytics rebuild failed")?;

    println!("Analytics rebuild complete");
    println!("DB: {}", cfg.db_path.display());
    println!("Backend: {}", cfg.backend.label());
    println!("Staged games: {}", summary.staged_games);
    println!("team_points rows: {}", summary.team_points_rows);
    println!("cumulative_points rows: {}", summary.cumulative_rows);

    Ok(())
}
