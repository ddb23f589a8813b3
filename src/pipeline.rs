use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::analytics::{AnalyticsSummary, rebuild_analytics};
use crate::api_client::{ApiClient, ApiFilters};
use crate::config::{PipelineConfig, StoreBackend};
use crate::error::{PipelineError, StoreError};
use crate::model::{Game, Team, TransformedGame};
use crate::records::{validate_games, validate_teams};
use crate::store::{
    GameSink, ParquetSink, SinkReport, TableSink, load_staged_games, open_db, read_dataset,
};
use crate::transform::transform;

#[derive(Debug, Clone)]
pub struct Extracted {
    pub teams: Vec<Team>,
    pub games: Vec<Game>,
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub run_id: i64,
    pub backend: StoreBackend,
    pub seasons_total: usize,
    pub teams: usize,
    pub games_fetched: usize,
    pub games_loaded: usize,
    pub dropped_unknown_team: usize,
    pub excluded_not_full_time: usize,
    pub sink: SinkReport,
    pub analytics: AnalyticsSummary,
}

/// Opens the database for the duration of the run; the handle is dropped
/// (and closed) on every exit path.
pub fn run_full_pipeline(cfg: &PipelineConfig) -> Result<PipelineSummary> {
    let api = ApiClient::from_config(cfg)?;
    let mut conn = open_db(&cfg.db_path)?;
    run_with(cfg, &api, &mut conn)
}

pub fn run_with(
    cfg: &PipelineConfig,
    api: &ApiClient,
    conn: &mut Connection,
) -> Result<PipelineSummary> {
    if cfg.seasons.is_empty() {
        return Err(PipelineError::Config("no seasons configured".to_string()).into());
    }
    let run_id = begin_run(conn, cfg)?;
    info!(
        "[PIPELINE] run {} starting: {} seasons, backend={}",
        run_id,
        cfg.seasons.len(),
        cfg.backend.label()
    );

    let extracted = extract(api, cfg).context("extract failed")?;
    let transformed = transform(&extracted.teams, &extracted.games);

    let sink = match cfg.backend {
        StoreBackend::Parquet => ParquetSink::new(cfg.games_dir()).write(&transformed.games),
        StoreBackend::Table => TableSink::new(conn).write(&transformed.games),
    }
    .context("load failed")?;

    let analytics = rebuild_from_store(cfg, conn).context("analytics rebuild failed")?;

    let summary = PipelineSummary {
        run_id,
        backend: cfg.backend,
        seasons_total: cfg.seasons.len(),
        teams: extracted.teams.len(),
        games_fetched: extracted.games.len(),
        games_loaded: transformed.games.len(),
        dropped_unknown_team: transformed.dropped_unknown_team,
        excluded_not_full_time: transformed.excluded_not_full_time,
        sink,
        analytics,
    };
    finish_run(conn, &summary)?;
    info!("[PIPELINE] run {} complete", run_id);
    Ok(summary)
}

/// Teams are fetched once; games are fetched per season on a bounded pool and
/// re-assembled in season order. The first failing season aborts the extract.
pub fn extract(api: &ApiClient, cfg: &PipelineConfig) -> Result<Extracted, PipelineError> {
    let raw_teams = api.fetch_teams(&ApiFilters::default())?;
    let teams = validate_teams(&raw_teams)?;
    info!("[EXTRACT] {} teams", teams.len());

    let pool = build_fetch_pool(cfg.fetch_parallelism);
    let per_season = with_fetch_pool(&pool, || {
        cfg.seasons
            .par_iter()
            .map(|season| -> Result<Vec<Game>, PipelineError> {
                let filters = ApiFilters::season(season.as_str(), cfg.stage_name.as_deref());
                let raw = api.fetch_games(&filters)?;
                let games = validate_games(&raw)?;
                info!("[EXTRACT] season {}: {} games", season, games.len());
                Ok(games)
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let games = per_season.into_iter().flatten().collect::<Vec<_>>();
    Ok(Extracted { teams, games })
}

/// Stages whatever the configured backend holds into `stg_games` and rebuilds
/// the aggregate tables from it.
pub fn rebuild_from_store(
    cfg: &PipelineConfig,
    conn: &mut Connection,
) -> Result<AnalyticsSummary, StoreError> {
    let staged: Vec<TransformedGame> = match cfg.backend {
        StoreBackend::Parquet => {
            let rows = read_dataset(&cfg.games_dir())?;
            TableSink::new(conn).write(&rows)?;
            rows
        }
        StoreBackend::Table => load_staged_games(conn)?,
    };
    if staged.is_empty() {
        warn!("[ANALYTICS] no staged games; aggregate tables will be empty");
    }
    rebuild_analytics(conn, &staged)
}

fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

fn begin_run(conn: &Connection, cfg: &PipelineConfig) -> Result<i64> {
    conn.execute(
        "INSERT INTO pipeline_runs(started_at, finished_at, backend, seasons_total)
         VALUES (?1, NULL, ?2, ?3)",
        params![
            Utc::now().to_rfc3339(),
            cfg.backend.label(),
            cfg.seasons.len() as i64
        ],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

fn finish_run(conn: &Connection, s: &PipelineSummary) -> Result<()> {
    conn.execute(
        "UPDATE pipeline_runs
         SET finished_at = ?1, teams = ?2, games_fetched = ?3, games_loaded = ?4,
             dropped_unknown_team = ?5, excluded_not_full_time = ?6,
             team_points_rows = ?7, cumulative_rows = ?8
         WHERE run_id = ?9",
        params![
            Utc::now().to_rfc3339(),
            s.teams as i64,
            s.games_fetched as i64,
            s.games_loaded as i64,
            s.dropped_unknown_team as i64,
            s.excluded_not_full_time as i64,
            s.analytics.team_points_rows as i64,
            s.analytics.cumulative_rows as i64,
            s.run_id
        ],
    )
    .context("update pipeline run")?;
    Ok(())
}
