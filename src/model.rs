use serde::{Deserialize, Serialize};

pub const STATUS_FULL_TIME: &str = "FullTime";

pub const WIN: i32 = 3;
pub const DRAW: i32 = 1;
pub const LOSE: i32 = 0;

/// Raw JSON objects as returned by the API, before validation.
pub type RawTeamRecord = serde_json::Value;
pub type RawGameRecord = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub date_time_utc: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_score: i32,
    pub away_score: i32,
    pub season_name: String,
    pub matchday: i32,
    pub status: String,
    pub knockout_game: bool,
}

impl Game {
    pub fn is_full_time(&self) -> bool {
        self.status == STATUS_FULL_TIME
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformedGame {
    pub game_id: String,
    pub date_time_utc: String,
    pub season_name: String,
    pub matchday: i32,
    pub home_team_name: String,
    pub home_team_score: i32,
    pub home_team_points: i32,
    pub away_team_name: String,
    pub away_team_score: i32,
    pub away_team_points: i32,
    pub knockout_game: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPointsRow {
    pub season_name: String,
    pub matchday: i32,
    pub team_name: String,
    pub score: i32,
    pub points: i32,
    pub opponent_name: String,
    pub opponent_score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeStatsRow {
    pub season_name: String,
    pub matchday: i32,
    pub game_number: i64,
    pub team_name: String,
    pub score: i32,
    pub opponent_name: String,
    pub opponent_score: i32,
    pub points: i32,
    pub cumulative_points: i64,
    pub cumulative_goals: i64,
}

/// Win/draw/loss points for one side given both final scores.
pub fn points_for(own_score: i32, opponent_score: i32) -> i32 {
    if own_score > opponent_score {
        WIN
    } else if own_score == opponent_score {
        DRAW
    } else {
        LOSE
    }
}
