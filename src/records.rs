use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::model::{Game, RawGameRecord, RawTeamRecord, STATUS_FULL_TIME, Team};

const TEAM: &str = "team";
const GAME: &str = "game";

pub fn validate_team(raw: &RawTeamRecord) -> Result<Team, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or(ValidationError::NotAnObject { kind: TEAM })?;
    let fields = Fields::new(TEAM, obj, "team_id");

    Ok(Team {
        id: fields.id("team_id")?,
        name: fields.string("team_name")?,
        abbreviation: fields.string("team_abbreviation")?,
    })
}

pub fn validate_game(raw: &RawGameRecord) -> Result<Game, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or(ValidationError::NotAnObject { kind: GAME })?;
    let fields = Fields::new(GAME, obj, "game_id");

    let id = fields.id("game_id")?;
    let status = fields.string("status")?;
    let full_time = status == STATUS_FULL_TIME;

    // Unplayed fixtures come back with null scores; only a finished game must have them.
    let score = |field: &'static str| -> Result<i32, ValidationError> {
        match fields.optional_int(field)? {
            Some(v) => Ok(v),
            None if full_time => Err(fields.missing(field)),
            None => Ok(0),
        }
    };

    Ok(Game {
        date_time_utc: fields.string("date_time_utc")?,
        home_team_id: fields.id("home_team_id")?,
        away_team_id: fields.id("away_team_id")?,
        home_score: score("home_score")?,
        away_score: score("away_score")?,
        season_name: fields.id("season_name")?,
        matchday: fields.int("matchday")?,
        knockout_game: fields.optional_bool("knockout_game")?.unwrap_or(false),
        status,
        id,
    })
}

pub fn validate_teams(raw: &[RawTeamRecord]) -> Result<Vec<Team>, ValidationError> {
    raw.iter().map(validate_team).collect()
}

pub fn validate_games(raw: &[RawGameRecord]) -> Result<Vec<Game>, ValidationError> {
    raw.iter().map(validate_game).collect()
}

struct Fields<'a> {
    kind: &'static str,
    obj: &'a Map<String, Value>,
    record_id: String,
}

impl<'a> Fields<'a> {
    fn new(kind: &'static str, obj: &'a Map<String, Value>, id_field: &str) -> Self {
        let record_id = obj
            .get(id_field)
            .and_then(scalar_to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        Self {
            kind,
            obj,
            record_id,
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> ValidationError {
        ValidationError::MissingField {
            kind: self.kind,
            record_id: self.record_id.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ValidationError {
        ValidationError::InvalidField {
            kind: self.kind,
            record_id: self.record_id.clone(),
            field,
            reason: reason.into(),
        }
    }

    fn string(&self, field: &'static str) -> Result<String, ValidationError> {
        let value = self.present(field).ok_or_else(|| self.missing(field))?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| self.invalid(field, format!("expected string, got {value}")))
    }

    /// Identifiers arrive as strings or bare numbers depending on the endpoint.
    fn id(&self, field: &'static str) -> Result<String, ValidationError> {
        let value = self.present(field).ok_or_else(|| self.missing(field))?;
        let id = scalar_to_string(value)
            .ok_or_else(|| self.invalid(field, format!("expected string or number, got {value}")))?;
        if id.trim().is_empty() {
            return Err(self.missing(field));
        }
        Ok(id)
    }

    fn int(&self, field: &'static str) -> Result<i32, ValidationError> {
        self.optional_int(field)?.ok_or_else(|| self.missing(field))
    }

    fn optional_int(&self, field: &'static str) -> Result<Option<i32>, ValidationError> {
        let Some(value) = self.present(field) else {
            return Ok(None);
        };
        as_i32_any(value)
            .map(Some)
            .ok_or_else(|| self.invalid(field, format!("expected integer, got {value}")))
    }

    fn optional_bool(&self, field: &'static str) -> Result<Option<bool>, ValidationError> {
        let Some(value) = self.present(field) else {
            return Ok(None);
        };
        as_bool_any(value)
            .map(Some)
            .ok_or_else(|| self.invalid(field, format!("expected boolean, got {value}")))
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return (f.fract() == 0.0 && f.is_finite()).then_some(f as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

fn as_i32_any(v: &Value) -> Option<i32> {
    let n = as_i64_any(v)?;
    i32::try_from(n).ok()
}

fn as_bool_any(v: &Value) -> Option<bool> {
    if let Some(b) = v.as_bool() {
        return Some(b);
    }
    if let Some(n) = v.as_i64() {
        return match n {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        };
    }
    match v.as_str()?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coercion_helpers() {
        assert_eq!(as_i32_any(&json!("7")), Some(7));
        assert_eq!(as_i32_any(&json!(2.0)), Some(2));
        assert_eq!(as_i32_any(&json!(2.5)), None);
        assert_eq!(as_i32_any(&json!("x")), None);
        assert_eq!(as_bool_any(&json!("TRUE")), Some(true));
        assert_eq!(as_bool_any(&json!(0)), Some(false));
        assert_eq!(as_bool_any(&json!(2)), None);
    }
}
