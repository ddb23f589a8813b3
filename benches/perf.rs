use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use mls_standings::analytics::{build_cumulative_stats, build_team_points};
use mls_standings::model::{Game, STATUS_FULL_TIME, Team};
use mls_standings::transform::transform;

const TEAMS: usize = 30;
const MATCHDAYS: i32 = 34;

fn sample_teams() -> Vec<Team> {
    (0..TEAMS)
        .map(|i| Team {
            id: format!("team{i:02}"),
            name: format!("Team {i:02} FC"),
            abbreviation: format!("T{i:02}"),
        })
        .collect()
}

/// Round-robin-ish season: every team plays once per matchday.
fn sample_games(seasons: &[&str]) -> Vec<Game> {
    let mut out = Vec::new();
    for season in seasons {
        for matchday in 1..=MATCHDAYS {
            let shift = matchday as usize;
            for slot in 0..TEAMS / 2 {
                let home = (slot + shift) % TEAMS;
                let away = (TEAMS - 1 - slot + shift) % TEAMS;
                out.push(Game {
                    id: format!("{season}-{matchday}-{slot}"),
                    date_time_utc: format!("{season}-03-01 00:00:00 UTC"),
                    home_team_id: format!("team{home:02}"),
                    away_team_id: format!("team{away:02}"),
                    home_score: ((slot + shift) % 4) as i32,
                    away_score: ((slot * 3 + shift) % 3) as i32,
                    season_name: season.to_string(),
                    matchday,
                    status: STATUS_FULL_TIME.to_string(),
                    knockout_game: false,
                });
            }
        }
    }
    out
}

fn bench_transform(c: &mut Criterion) {
    let teams = sample_teams();
    let games = sample_games(&["2023"]);
    c.bench_function("transform_season", |b| {
        b.iter(|| {
            let out = transform(black_box(&teams), black_box(&games));
            black_box(out.games.len());
        })
    });
}

fn bench_cumulative_stats(c: &mut Criterion) {
    let teams = sample_teams();
    let games = sample_games(&["2021", "2022", "2023", "2024", "2025"]);
    let staged = transform(&teams, &games).games;
    c.bench_function("cumulative_stats_five_seasons", |b| {
        b.iter(|| {
            let team_points = build_team_points(black_box(&staged));
            let rows = build_cumulative_stats(&team_points);
            black_box(rows.len());
        })
    });
}

criterion_group!(perf, bench_transform, bench_cumulative_stats);
criterion_main!(perf);
