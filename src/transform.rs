use std::collections::HashMap;

use tracing::{info, warn};

use crate::model::{Game, Team, TransformedGame, points_for};

const DROPPED_SAMPLE: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub games: Vec<TransformedGame>,
    /// Games whose home or away id has no matching team.
    pub dropped_unknown_team: usize,
    pub excluded_not_full_time: usize,
}

pub fn transform(teams: &[Team], games: &[Game]) -> Transformed {
    let names: HashMap<&str, &str> = teams
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .collect();

    let mut out = Transformed {
        games: Vec::with_capacity(games.len()),
        ..Transformed::default()
    };
    let mut dropped_ids: Vec<&str> = Vec::new();

    for game in games {
        let (Some(home), Some(away)) = (
            names.get(game.home_team_id.as_str()),
            names.get(game.away_team_id.as_str()),
        ) else {
            out.dropped_unknown_team += 1;
            if dropped_ids.len() < DROPPED_SAMPLE {
                dropped_ids.push(&game.id);
            }
            continue;
        };
        if !game.is_full_time() {
            out.excluded_not_full_time += 1;
            continue;
        }
        out.games.push(score_game(game, home, away));
    }

    if out.dropped_unknown_team > 0 {
        warn!(
            "[TRANSFORM] dropped {} games referencing unknown team ids (e.g. {:?})",
            out.dropped_unknown_team, dropped_ids
        );
    }
    info!(
        "[TRANSFORM] {} scored games ({} not full-time excluded)",
        out.games.len(),
        out.excluded_not_full_time
    );
    out
}

fn score_game(game: &Game, home_name: &str, away_name: &str) -> TransformedGame {
    TransformedGame {
        game_id: game.id.clone(),
        date_time_utc: game.date_time_utc.clone(),
        season_name: game.season_name.clone(),
        matchday: game.matchday,
        home_team_name: home_name.to_string(),
        home_team_score: game.home_score,
        home_team_points: points_for(game.home_score, game.away_score),
        away_team_name: away_name.to_string(),
        away_team_score: game.away_score,
        away_team_points: points_for(game.away_score, game.home_score),
        knockout_game: game.knockout_game,
    }
}
