use std::path::Path;

use rusqlite::{Connection, Transaction, params};
use tracing::info;

use super::{GameSink, SinkReport};
use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::model::TransformedGame;

pub const STG_GAMES: &str = "stg_games";
pub const TEAM_POINTS: &str = "team_points";
pub const CUMULATIVE_POINTS: &str = "cumulative_points";

const STAGING_SUFFIX: &str = "__staging";

const STG_GAMES_COLUMNS: &str = r#"
    game_id TEXT NOT NULL,
    date_time_utc TEXT NOT NULL,
    season_name TEXT NOT NULL,
    matchday INTEGER NOT NULL,
    home_team_name TEXT NOT NULL,
    home_team_score INTEGER NOT NULL,
    home_team_points INTEGER NOT NULL,
    away_team_name TEXT NOT NULL,
    away_team_score INTEGER NOT NULL,
    away_team_points INTEGER NOT NULL,
    knockout_game INTEGER NOT NULL
"#;

pub fn open_db(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("create db dir {}", parent.display()), e))?;
    }
    let conn = Connection::open(path)
        .map_err(|e| StoreError::sqlite(format!("open sqlite db {}", path.display()), e))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            backend TEXT NOT NULL,
            seasons_total INTEGER NOT NULL,
            teams INTEGER NOT NULL DEFAULT 0,
            games_fetched INTEGER NOT NULL DEFAULT 0,
            games_loaded INTEGER NOT NULL DEFAULT 0,
            dropped_unknown_team INTEGER NOT NULL DEFAULT 0,
            excluded_not_full_time INTEGER NOT NULL DEFAULT 0,
            team_points_rows INTEGER NOT NULL DEFAULT 0,
            cumulative_rows INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .map_err(|e| StoreError::sqlite("create sqlite schema", e))
}

pub fn staging_name(table: &str) -> String {
    format!("{table}{STAGING_SUFFIX}")
}

/// Creates an empty `<table>__staging`, discarding leftovers from an aborted run.
pub fn create_staging(tx: &Transaction<'_>, table: &str, columns: &str) -> Result<String, StoreError> {
    let staging = staging_name(table);
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {staging}; CREATE TABLE {staging} ({columns});"
    ))
    .map_err(|e| StoreError::sqlite(format!("create {staging}"), e))?;
    Ok(staging)
}

/// Replaces `table` with its staging twin. Runs inside the caller's transaction,
/// so readers see either the old table or the new one.
pub fn swap_in_staging(tx: &Transaction<'_>, table: &str) -> Result<(), StoreError> {
    let staging = staging_name(table);
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; ALTER TABLE {staging} RENAME TO {table};"
    ))
    .map_err(|e| StoreError::sqlite(format!("swap {staging} into {table}"), e))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| StoreError::sqlite(format!("lookup table {table}"), e))
}

/// Stages and swaps `stg_games` within the given transaction.
pub fn replace_staged_games(tx: &Transaction<'_>, rows: &[TransformedGame]) -> Result<(), StoreError> {
    let staging = create_staging(tx, STG_GAMES, STG_GAMES_COLUMNS)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {staging} (
                    game_id, date_time_utc, season_name, matchday,
                    home_team_name, home_team_score, home_team_points,
                    away_team_name, away_team_score, away_team_points,
                    knockout_game
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ))
            .map_err(|e| StoreError::sqlite("prepare stg_games insert", e))?;
        for g in rows {
            stmt.execute(params![
                g.game_id,
                g.date_time_utc,
                g.season_name,
                g.matchday,
                g.home_team_name,
                g.home_team_score,
                g.home_team_points,
                g.away_team_name,
                g.away_team_score,
                g.away_team_points,
                g.knockout_game,
            ])
            .map_err(|e| StoreError::sqlite(format!("insert game {}", g.game_id), e))?;
        }
    }
    swap_in_staging(tx, STG_GAMES)
}

pub fn load_staged_games(conn: &Connection) -> Result<Vec<TransformedGame>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT
                game_id, date_time_utc, season_name, matchday,
                home_team_name, home_team_score, home_team_points,
                away_team_name, away_team_score, away_team_points,
                knockout_game
            FROM {STG_GAMES}
            ORDER BY season_name ASC, matchday ASC, game_id ASC
            "#
        ))
        .map_err(|e| StoreError::sqlite("prepare load stg_games", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(TransformedGame {
                game_id: row.get(0)?,
                date_time_utc: row.get(1)?,
                season_name: row.get(2)?,
                matchday: row.get(3)?,
                home_team_name: row.get(4)?,
                home_team_score: row.get(5)?,
                home_team_points: row.get(6)?,
                away_team_name: row.get(7)?,
                away_team_score: row.get(8)?,
                away_team_points: row.get(9)?,
                knockout_game: row.get(10)?,
            })
        })
        .map_err(|e| StoreError::sqlite("query stg_games", e))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StoreError::sqlite("decode stg_games row", e))?);
    }
    Ok(out)
}

pub struct TableSink<'c> {
    conn: &'c mut Connection,
}

impl<'c> TableSink<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }
}

impl GameSink for TableSink<'_> {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Table
    }

    fn write(&mut self, rows: &[TransformedGame]) -> Result<SinkReport, StoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::sqlite("begin stg_games transaction", e))?;
        replace_staged_games(&tx, rows)?;
        tx.commit()
            .map_err(|e| StoreError::sqlite("commit stg_games", e))?;
        info!("[STORE] replaced {} with {} rows", STG_GAMES, rows.len());
        Ok(SinkReport {
            rows_written: rows.len(),
            partitions_written: 1,
        })
    }
}
