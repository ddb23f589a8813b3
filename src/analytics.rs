use std::collections::BTreeMap;

use rusqlite::{Connection, Transaction, params};
use tracing::info;

use crate::error::StoreError;
use crate::model::{CumulativeStatsRow, TeamPointsRow, TransformedGame};
use crate::store::table::{CUMULATIVE_POINTS, TEAM_POINTS, create_staging, swap_in_staging};

const TEAM_POINTS_COLUMNS: &str = r#"
    season_name TEXT NOT NULL,
    matchday INTEGER NOT NULL,
    team_name TEXT NOT NULL,
    score INTEGER NOT NULL,
    points INTEGER NOT NULL,
    opponent_name TEXT NOT NULL,
    opponent_score INTEGER NOT NULL
"#;

const CUMULATIVE_POINTS_COLUMNS: &str = r#"
    season_name TEXT NOT NULL,
    matchday INTEGER NOT NULL,
    game_number INTEGER NOT NULL,
    team_name TEXT NOT NULL,
    score INTEGER NOT NULL,
    opponent_name TEXT NOT NULL,
    opponent_score INTEGER NOT NULL,
    points INTEGER NOT NULL,
    cumulative_points INTEGER NOT NULL,
    cumulative_goals INTEGER NOT NULL
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyticsSummary {
    pub staged_games: usize,
    pub team_points_rows: usize,
    pub cumulative_rows: usize,
}

/// One row per side of every staged game. Duplicates are kept, so the output
/// is always exactly twice the input.
pub fn build_team_points(games: &[TransformedGame]) -> Vec<TeamPointsRow> {
    let mut rows = Vec::with_capacity(games.len() * 2);
    for g in games {
        rows.push(TeamPointsRow {
            season_name: g.season_name.clone(),
            matchday: g.matchday,
            team_name: g.home_team_name.clone(),
            score: g.home_team_score,
            points: g.home_team_points,
            opponent_name: g.away_team_name.clone(),
            opponent_score: g.away_team_score,
        });
        rows.push(TeamPointsRow {
            season_name: g.season_name.clone(),
            matchday: g.matchday,
            team_name: g.away_team_name.clone(),
            score: g.away_team_score,
            points: g.away_team_points,
            opponent_name: g.home_team_name.clone(),
            opponent_score: g.home_team_score,
        });
    }
    // Stable output for repeatable tables; callers must not rely on it.
    rows.sort_by(|a, b| {
        a.season_name
            .cmp(&b.season_name)
            .then(a.matchday.cmp(&b.matchday))
            .then_with(|| a.team_name.cmp(&b.team_name))
            .then_with(|| a.opponent_name.cmp(&b.opponent_name))
            .then(a.score.cmp(&b.score))
            .then(a.opponent_score.cmp(&b.opponent_score))
    });
    rows
}

/// Running totals per (team, season) in matchday order. `game_number` is a
/// strict row ordinal, so two games on the same matchday get 1 and 2, not 1 and 1.
pub fn build_cumulative_stats(team_points: &[TeamPointsRow]) -> Vec<CumulativeStatsRow> {
    let mut partitions: BTreeMap<(&str, &str), Vec<&TeamPointsRow>> = BTreeMap::new();
    for row in team_points {
        partitions
            .entry((row.team_name.as_str(), row.season_name.as_str()))
            .or_default()
            .push(row);
    }

    let mut out = Vec::with_capacity(team_points.len());
    for (_, mut rows) in partitions {
        rows.sort_by_key(|r| r.matchday);

        let mut cumulative_points = 0i64;
        let mut cumulative_goals = 0i64;
        for (idx, r) in rows.into_iter().enumerate() {
            cumulative_points += i64::from(r.points);
            cumulative_goals += i64::from(r.score);
            out.push(CumulativeStatsRow {
                season_name: r.season_name.clone(),
                matchday: r.matchday,
                game_number: idx as i64 + 1,
                team_name: r.team_name.clone(),
                score: r.score,
                opponent_name: r.opponent_name.clone(),
                opponent_score: r.opponent_score,
                points: r.points,
                cumulative_points,
                cumulative_goals,
            });
        }
    }
    out
}

/// Rebuilds `team_points` and `cumulative_points` from the staged games in
/// one transaction; readers never see a half-built pair.
pub fn rebuild_analytics(
    conn: &mut Connection,
    staged: &[TransformedGame],
) -> Result<AnalyticsSummary, StoreError> {
    let team_points = build_team_points(staged);
    let cumulative = build_cumulative_stats(&team_points);

    let tx = conn
        .transaction()
        .map_err(|e| StoreError::sqlite("begin analytics transaction", e))?;
    write_team_points(&tx, &team_points)?;
    write_cumulative_points(&tx, &cumulative)?;
    tx.commit()
        .map_err(|e| StoreError::sqlite("commit analytics tables", e))?;

    let summary = AnalyticsSummary {
        staged_games: staged.len(),
        team_points_rows: team_points.len(),
        cumulative_rows: cumulative.len(),
    };
    info!(
        "[ANALYTICS] rebuilt from {} games: {} team_points, {} cumulative_points",
        summary.staged_games, summary.team_points_rows, summary.cumulative_rows
    );
    Ok(summary)
}

fn write_team_points(tx: &Transaction<'_>, rows: &[TeamPointsRow]) -> Result<(), StoreError> {
    let staging = create_staging(tx, TEAM_POINTS, TEAM_POINTS_COLUMNS)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {staging} (
                    season_name, matchday, team_name, score, points, opponent_name, opponent_score
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))
            .map_err(|e| StoreError::sqlite("prepare team_points insert", e))?;
        for r in rows {
            stmt.execute(params![
                r.season_name,
                r.matchday,
                r.team_name,
                r.score,
                r.points,
                r.opponent_name,
                r.opponent_score,
            ])
            .map_err(|e| StoreError::sqlite("insert team_points row", e))?;
        }
    }
    swap_in_staging(tx, TEAM_POINTS)
}

fn write_cumulative_points(
    tx: &Transaction<'_>,
    rows: &[CumulativeStatsRow],
) -> Result<(), StoreError> {
    let staging = create_staging(tx, CUMULATIVE_POINTS, CUMULATIVE_POINTS_COLUMNS)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {staging} (
                    season_name, matchday, game_number, team_name, score,
                    opponent_name, opponent_score, points, cumulative_points, cumulative_goals
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))
            .map_err(|e| StoreError::sqlite("prepare cumulative_points insert", e))?;
        for r in rows {
            stmt.execute(params![
                r.season_name,
                r.matchday,
                r.game_number,
                r.team_name,
                r.score,
                r.opponent_name,
                r.opponent_score,
                r.points,
                r.cumulative_points,
                r.cumulative_goals,
            ])
            .map_err(|e| StoreError::sqlite("insert cumulative_points row", e))?;
        }
    }
    swap_in_staging(tx, CUMULATIVE_POINTS)
}

pub fn load_team_points(conn: &Connection) -> Result<Vec<TeamPointsRow>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT season_name, matchday, team_name, score, points, opponent_name, opponent_score
             FROM {TEAM_POINTS}"
        ))
        .map_err(|e| StoreError::sqlite("prepare load team_points", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TeamPointsRow {
                season_name: row.get(0)?,
                matchday: row.get(1)?,
                team_name: row.get(2)?,
                score: row.get(3)?,
                points: row.get(4)?,
                opponent_name: row.get(5)?,
                opponent_score: row.get(6)?,
            })
        })
        .map_err(|e| StoreError::sqlite("query team_points", e))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StoreError::sqlite("decode team_points row", e))?);
    }
    Ok(out)
}

pub fn load_cumulative_stats(conn: &Connection) -> Result<Vec<CumulativeStatsRow>, StoreError> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT
                season_name, matchday, game_number, team_name, score,
                opponent_name, opponent_score, points, cumulative_points, cumulative_goals
            FROM {CUMULATIVE_POINTS}
            ORDER BY team_name ASC, season_name ASC, game_number ASC
            "#
        ))
        .map_err(|e| StoreError::sqlite("prepare load cumulative_points", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CumulativeStatsRow {
                season_name: row.get(0)?,
                matchday: row.get(1)?,
                game_number: row.get(2)?,
                team_name: row.get(3)?,
                score: row.get(4)?,
                opponent_name: row.get(5)?,
                opponent_score: row.get(6)?,
                points: row.get(7)?,
                cumulative_points: row.get(8)?,
                cumulative_goals: row.get(9)?,
            })
        })
        .map_err(|e| StoreError::sqlite("query cumulative_points", e))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StoreError::sqlite("decode cumulative_points row", e))?);
    }
    Ok(out)
}
