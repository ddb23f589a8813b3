use anyhow::{Context, Result, anyhow};

use mls_standings::config::{PipelineConfig, parse_db_path_arg};
use mls_standings::logging::init_tracing;
use mls_standings::pipeline::run_full_pipeline;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env().context("load config")?;
    if let Some(db_path) = parse_db_path_arg(&args) {
        cfg.db_path = db_path;
    }
    let seasons = parse_season_args(&args)?;
    if !seasons.is_empty() {
        cfg.seasons = seasons;
    }

    let summary = run_full_pipeline(&cfg)?;

    println!("Standings pipeline complete");
    println!("Run: {}", summary.run_id);
    println!("DB: {}", cfg.db_path.display());
    println!("Backend: {}", summary.backend.label());
    println!("Seasons: {}", summary.seasons_total);
    println!("Teams: {}", summary.teams);
    println!(
        "Games: fetched={} loaded={} not_full_time={} unknown_team={}",
        summary.games_fetched,
        summary.games_loaded,
        summary.excluded_not_full_time,
        summary.dropped_unknown_team
    );
    println!(
        "Store: rows={} partitions={}",
        summary.sink.rows_written, summary.sink.partitions_written
    );
    println!(
        "Analytics: staged={} team_points={} cumulative_points={}",
        summary.analytics.staged_games,
        summary.analytics.team_points_rows,
        summary.analytics.cumulative_rows
    );

    Ok(())
}

/// Collects every `--season <year>` / `--season=<year>`, in the order given.
fn parse_season_args(args: &[String]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        let raw = if let Some(value) = arg.strip_prefix("--season=") {
            value
        } else if arg == "--season" {
            args.get(idx + 1)
                .map(String::as_str)
                .ok_or_else(|| anyhow!("--season needs a value"))?
        } else {
            continue;
        };
        let season = raw.trim();
        if season.parse::<u16>().is_err() {
            return Err(anyhow!("invalid season `{season}`"));
        }
        if !out.iter().any(|s| s == season) {
            out.push(season.to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn season_flags_are_repeatable() {
        let parsed =
            parse_season_args(&args(&["--season", "2023", "--db", "x.sqlite", "--season=2024"]))
                .unwrap();
        assert_eq!(parsed, vec!["2023".to_string(), "2024".to_string()]);
    }

    #[test]
    fn season_flag_rejects_garbage() {
        assert!(parse_season_args(&args(&["--season", "twenty"])).is_err());
        assert!(parse_season_args(&args(&["--season"])).is_err());
        assert!(parse_season_args(&args(&[])).unwrap().is_empty());
    }
}
