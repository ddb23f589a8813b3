use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OpenFlags};

use crate::analytics::load_cumulative_stats;
use crate::model::CumulativeStatsRow;
use crate::store::table::{CUMULATIVE_POINTS, table_exists};

/// Read-only access to `cumulative_points`, memoized on the database file's
/// modification time so a pipeline re-run is picked up on the next load.
pub struct StandingsReader {
    db_path: PathBuf,
    cache: Mutex<Option<CachedStandings>>,
}

struct CachedStandings {
    modified: SystemTime,
    rows: Arc<Vec<CumulativeStatsRow>>,
}

impl StandingsReader {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn load_standings(&self) -> Result<Arc<Vec<CumulativeStatsRow>>> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|_| anyhow!("standings cache lock poisoned"))?;

        let Some(modified) = db_modified(&self.db_path) else {
            *guard = None;
            return Ok(Arc::new(Vec::new()));
        };
        if let Some(cached) = guard.as_ref()
            && cached.modified == modified
        {
            return Ok(Arc::clone(&cached.rows));
        }

        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("open {} read-only", self.db_path.display()))?;
        let rows = if table_exists(&conn, CUMULATIVE_POINTS)? {
            load_cumulative_stats(&conn)?
        } else {
            Vec::new()
        };
        let rows = Arc::new(rows);
        *guard = Some(CachedStandings {
            modified,
            rows: Arc::clone(&rows),
        });
        Ok(rows)
    }
}

/// Latest mtime across the database and its WAL file.
fn db_modified(path: &Path) -> Option<SystemTime> {
    let main = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let wal = fs::metadata(PathBuf::from(wal))
        .and_then(|m| m.modified())
        .ok();
    Some(wal.map_or(main, |w| w.max(main)))
}

/// Team equality plus season membership. No team or no seasons matches nothing.
pub fn filter_rows<'a>(
    rows: &'a [CumulativeStatsRow],
    team: Option<&str>,
    seasons: &BTreeSet<String>,
) -> Vec<&'a CumulativeStatsRow> {
    let Some(team) = team else {
        return Vec::new();
    };
    rows.iter()
        .filter(|r| r.team_name == team && seasons.contains(&r.season_name))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XAxis {
    GameNumber,
    Matchday,
}

impl XAxis {
    pub fn label(self) -> &'static str {
        match self {
            XAxis::GameNumber => "Game number",
            XAxis::Matchday => "Matchday",
        }
    }

    fn value(self, row: &CumulativeStatsRow) -> f64 {
        match self {
            XAxis::GameNumber => row.game_number as f64,
            XAxis::Matchday => f64::from(row.matchday),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Teams,
    Seasons,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub season: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    rows: Arc<Vec<CumulativeStatsRow>>,
    pub teams: Vec<String>,
    /// Newest first.
    pub seasons: Vec<String>,
    pub selected_team: Option<String>,
    pub selected_seasons: BTreeSet<String>,
    pub team_cursor: usize,
    pub season_cursor: usize,
    pub focus: Focus,
    pub x_axis: XAxis,
    pub help_overlay: bool,
}

impl DashboardState {
    pub fn new(rows: Arc<Vec<CumulativeStatsRow>>) -> Self {
        let mut state = Self {
            rows: Arc::new(Vec::new()),
            teams: Vec::new(),
            seasons: Vec::new(),
            selected_team: None,
            selected_seasons: BTreeSet::new(),
            team_cursor: 0,
            season_cursor: 0,
            focus: Focus::Teams,
            x_axis: XAxis::GameNumber,
            help_overlay: false,
        };
        state.set_rows(rows);
        state.selected_team = state.teams.first().cloned();
        state
    }

    /// Swaps in freshly loaded rows, keeping selections that still exist.
    pub fn set_rows(&mut self, rows: Arc<Vec<CumulativeStatsRow>>) {
        let teams: BTreeSet<&str> = rows.iter().map(|r| r.team_name.as_str()).collect();
        let seasons: BTreeSet<&str> = rows.iter().map(|r| r.season_name.as_str()).collect();
        self.teams = teams.into_iter().map(str::to_string).collect();
        self.seasons = seasons.into_iter().rev().map(str::to_string).collect();
        self.rows = rows;

        if let Some(team) = self.selected_team.as_ref()
            && !self.teams.contains(team)
        {
            self.selected_team = None;
        }
        let known = &self.seasons;
        self.selected_seasons.retain(|s| known.contains(s));
        self.team_cursor = self.team_cursor.min(self.teams.len().saturating_sub(1));
        self.season_cursor = self.season_cursor.min(self.seasons.len().saturating_sub(1));
    }

    pub fn rows(&self) -> &[CumulativeStatsRow] {
        &self.rows
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Teams => Focus::Seasons,
            Focus::Seasons => Focus::Teams,
        };
    }

    pub fn toggle_x_axis(&mut self) {
        self.x_axis = match self.x_axis {
            XAxis::GameNumber => XAxis::Matchday,
            XAxis::Matchday => XAxis::GameNumber,
        };
    }

    pub fn select_next(&mut self) {
        let (cursor, len) = self.cursor_mut();
        if len > 0 && *cursor + 1 < len {
            *cursor += 1;
        }
    }

    pub fn select_prev(&mut self) {
        let (cursor, _) = self.cursor_mut();
        *cursor = cursor.saturating_sub(1);
    }

    /// Picks the team under the cursor, or toggles the season under the cursor.
    pub fn activate(&mut self) {
        match self.focus {
            Focus::Teams => {
                if let Some(team) = self.teams.get(self.team_cursor) {
                    self.selected_team = Some(team.clone());
                }
            }
            Focus::Seasons => {
                if let Some(season) = self.seasons.get(self.season_cursor).cloned()
                    && !self.selected_seasons.remove(&season)
                {
                    self.selected_seasons.insert(season);
                }
            }
        }
    }

    pub fn clear_team(&mut self) {
        self.selected_team = None;
    }

    pub fn select_all_seasons(&mut self) {
        self.selected_seasons = self.seasons.iter().cloned().collect();
    }

    pub fn clear_seasons(&mut self) {
        self.selected_seasons.clear();
    }

    /// One series per selected season for the selected team, ordered by season.
    pub fn series(&self) -> Vec<ChartSeries> {
        let filtered = filter_rows(
            &self.rows,
            self.selected_team.as_deref(),
            &self.selected_seasons,
        );
        let mut out: Vec<ChartSeries> = Vec::new();
        for season in &self.selected_seasons {
            let mut points: Vec<(f64, f64)> = filtered
                .iter()
                .filter(|r| &r.season_name == season)
                .map(|r| (self.x_axis.value(r), r.cumulative_points as f64))
                .collect();
            if points.is_empty() {
                continue;
            }
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            out.push(ChartSeries {
                season: season.clone(),
                points,
            });
        }
        out
    }

    fn cursor_mut(&mut self) -> (&mut usize, usize) {
        match self.focus {
            Focus::Teams => (&mut self.team_cursor, self.teams.len()),
            Focus::Seasons => (&mut self.season_cursor, self.seasons.len()),
        }
    }
}

/// Axis upper bounds covering every point, with a floor so empty charts still draw.
pub fn chart_bounds(series: &[ChartSeries]) -> (f64, f64) {
    let mut x_max = 1.0f64;
    let mut y_max = 1.0f64;
    for s in series {
        for (x, y) in &s.points {
            x_max = x_max.max(*x);
            y_max = y_max.max(*y);
        }
    }
    (x_max, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_modified_missing_file_is_none() {
        assert!(db_modified(Path::new("/definitely/not/here.sqlite")).is_none());
    }

    #[test]
    fn chart_bounds_have_floor() {
        assert_eq!(chart_bounds(&[]), (1.0, 1.0));
        let series = vec![ChartSeries {
            season: "2023".to_string(),
            points: vec![(1.0, 3.0), (2.0, 4.0)],
        }];
        assert_eq!(chart_bounds(&series), (2.0, 4.0));
    }
}
