mod common;

use mls_standings::model::{Game, Team};
use mls_standings::records::{validate_games, validate_teams};
use mls_standings::transform::transform;

use common::fixture_records;

fn fixture_inputs() -> (Vec<Team>, Vec<Game>) {
    let teams = validate_teams(&fixture_records("teams.json")).unwrap();
    let games = validate_games(&fixture_records("games.json")).unwrap();
    (teams, games)
}

#[test]
fn keeps_only_full_time_games_with_known_teams() {
    let (teams, games) = fixture_inputs();
    let out = transform(&teams, &games);

    assert_eq!(out.games.len(), 3);
    assert_eq!(out.excluded_not_full_time, 1);
    assert_eq!(out.dropped_unknown_team, 1);
    let ids = out.games.iter().map(|g| g.game_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["zeQZkrBKqK", "Vj58weDPQ8", "OlMlJb2MLz"]);
}

#[test]
fn resolves_names_and_awards_points() {
    let (teams, games) = fixture_inputs();
    let out = transform(&teams, &games);

    let win = &out.games[0];
    assert_eq!(win.home_team_name, "Austin FC");
    assert_eq!(win.away_team_name, "LA Galaxy");
    assert_eq!((win.home_team_points, win.away_team_points), (3, 0));

    let draw = &out.games[1];
    assert_eq!(draw.home_team_name, "Seattle Sounders FC");
    assert_eq!((draw.home_team_points, draw.away_team_points), (1, 1));

    let loss = &out.games[2];
    assert_eq!((loss.home_team_points, loss.away_team_points), (0, 3));
}

#[test]
fn point_sums_are_two_or_three() {
    let (teams, games) = fixture_inputs();
    for g in transform(&teams, &games).games {
        let sum = g.home_team_points + g.away_team_points;
        assert!(sum == 2 || sum == 3, "game {} sums to {sum}", g.game_id);
        if g.home_team_score == g.away_team_score {
            assert_eq!((g.home_team_points, g.away_team_points), (1, 1));
        }
    }
}

#[test]
fn empty_inputs_give_empty_output() {
    let out = transform(&[], &[]);
    assert!(out.games.is_empty());
    assert_eq!(out.dropped_unknown_team, 0);
    assert_eq!(out.excluded_not_full_time, 0);
}

#[test]
fn unknown_team_on_unplayed_game_counts_as_drop() {
    let (teams, mut games) = fixture_inputs();
    games[3].away_team_id = "missing".to_string();
    let out = transform(&teams, &games);
    assert_eq!(out.dropped_unknown_team, 2);
    assert_eq!(out.excluded_not_full_time, 0);
}
