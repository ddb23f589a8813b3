mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mls_standings::analytics::{build_cumulative_stats, build_team_points, rebuild_analytics};
use mls_standings::dashboard::{DashboardState, Focus, StandingsReader, XAxis, filter_rows};
use mls_standings::model::CumulativeStatsRow;
use mls_standings::store::open_db;

use common::game;

fn standings() -> Vec<CumulativeStatsRow> {
    let games = vec![
        game("g1", "2023", 1, ("Austin FC", 3), ("LA Galaxy", 0)),
        game("g2", "2023", 2, ("Seattle Sounders FC", 1), ("Austin FC", 1)),
        game("g3", "2023", 3, ("Austin FC", 0), ("LA Galaxy", 2)),
        game("h1", "2024", 4, ("Austin FC", 2), ("LA Galaxy", 1)),
    ];
    build_cumulative_stats(&build_team_points(&games))
}

fn seasons(raw: &[&str]) -> BTreeSet<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn filter_needs_team_and_seasons() {
    let rows = standings();
    assert!(filter_rows(&rows, None, &seasons(&["2023"])).is_empty());
    assert!(filter_rows(&rows, Some("Austin FC"), &BTreeSet::new()).is_empty());

    let hits = filter_rows(&rows, Some("Austin FC"), &seasons(&["2023"]));
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|r| r.team_name == "Austin FC" && r.season_name == "2023"));
    assert_eq!(filter_rows(&rows, Some("Austin FC"), &seasons(&["2023", "2024"])).len(), 4);
}

#[test]
fn fresh_state_selects_first_team_and_no_seasons() {
    let state = DashboardState::new(Arc::new(standings()));
    assert_eq!(
        state.teams,
        vec!["Austin FC", "LA Galaxy", "Seattle Sounders FC"]
    );
    assert_eq!(state.seasons, vec!["2024", "2023"]);
    assert_eq!(state.selected_team.as_deref(), Some("Austin FC"));
    assert!(state.series().is_empty());
}

#[test]
fn series_follow_selection_and_axis() {
    let mut state = DashboardState::new(Arc::new(standings()));
    state.select_all_seasons();
    let series = state.series();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].season, "2023");
    assert_eq!(series[0].points, vec![(1.0, 3.0), (2.0, 4.0), (3.0, 4.0)]);
    assert_eq!(series[1].points, vec![(1.0, 3.0)]);

    state.toggle_x_axis();
    assert_eq!(state.x_axis, XAxis::Matchday);
    assert_eq!(state.series()[1].points, vec![(4.0, 3.0)]);

    state.clear_team();
    assert!(state.series().is_empty());
}

#[test]
fn keyboard_navigation_toggles_seasons() {
    let mut state = DashboardState::new(Arc::new(standings()));
    state.select_next();
    state.activate();
    assert_eq!(state.selected_team.as_deref(), Some("LA Galaxy"));

    state.toggle_focus();
    assert_eq!(state.focus, Focus::Seasons);
    state.select_next();
    state.select_next();
    assert_eq!(state.season_cursor, 1);
    state.activate();
    assert_eq!(state.selected_seasons, seasons(&["2023"]));
    state.activate();
    assert!(state.selected_seasons.is_empty());
}

#[test]
fn reload_drops_selections_that_vanished() {
    let mut state = DashboardState::new(Arc::new(standings()));
    state.select_all_seasons();
    let only_2023 = standings()
        .into_iter()
        .filter(|r| r.season_name == "2023")
        .collect::<Vec<_>>();
    state.set_rows(Arc::new(only_2023));
    assert_eq!(state.selected_seasons, seasons(&["2023"]));
    assert_eq!(state.selected_team.as_deref(), Some("Austin FC"));
}

#[test]
fn reader_handles_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let reader = StandingsReader::new(dir.path().join("absent.sqlite"));
    assert!(reader.load_standings().unwrap().is_empty());
}

#[test]
fn reader_handles_database_without_analytics() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mls.sqlite");
    drop(open_db(&db_path).unwrap());
    let reader = StandingsReader::new(&db_path);
    assert!(reader.load_standings().unwrap().is_empty());
}

#[test]
fn reader_caches_until_database_changes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mls.sqlite");
    let mut conn = open_db(&db_path).unwrap();
    rebuild_analytics(
        &mut conn,
        &[game("g1", "2023", 1, ("Austin FC", 3), ("LA Galaxy", 0))],
    )
    .unwrap();

    let reader = StandingsReader::new(&db_path);
    let first = reader.load_standings().unwrap();
    let again = reader.load_standings().unwrap();
    assert_eq!(first.len(), 2);
    assert!(Arc::ptr_eq(&first, &again));

    // Coarse filesystem clocks need a visible gap between writes.
    thread::sleep(Duration::from_millis(1100));
    rebuild_analytics(
        &mut conn,
        &[
            game("g1", "2023", 1, ("Austin FC", 3), ("LA Galaxy", 0)),
            game("g2", "2023", 2, ("LA Galaxy", 1), ("Austin FC", 1)),
        ],
    )
    .unwrap();

    let refreshed = reader.load_standings().unwrap();
    assert_eq!(refreshed.len(), 4);
    assert!(!Arc::ptr_eq(&first, &refreshed));
}
