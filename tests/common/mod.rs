#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use serde_json::Value;

use mls_standings::model::TransformedGame;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

pub fn fixture_records(name: &str) -> Vec<Value> {
    serde_json::from_str(&read_fixture(name)).expect("fixture should be a json array")
}

/// Reply produced by a route: status code and body.
pub type Reply = (u16, String);

/// Local HTTP responder. Every connection gets one response and is closed.
/// The accept thread runs until the test process exits.
pub struct TestServer {
    pub base_url: String,
}

impl TestServer {
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let route = Arc::new(route);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    continue;
                };
                let route = Arc::clone(&route);
                thread::spawn(move || handle(stream, route.as_ref()));
            }
        });
        Self {
            base_url: format!("http://{addr}/api"),
        }
    }
}

fn handle<F>(mut stream: TcpStream, route: &F)
where
    F: Fn(&str, &str) -> Reply,
{
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let (status, body) = route(path, query);
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Value of `key` in a raw query string; `+` decodes to a space.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| v.replace('+', " ").replace("%20", " "))
    })
}

pub fn game(
    id: &str,
    season: &str,
    matchday: i32,
    home: (&str, i32),
    away: (&str, i32),
) -> TransformedGame {
    let points = |own: i32, opp: i32| mls_standings::model::points_for(own, opp);
    TransformedGame {
        game_id: id.to_string(),
        date_time_utc: format!("{season}-03-{:02} 00:00:00 UTC", matchday.clamp(1, 28)),
        season_name: season.to_string(),
        matchday,
        home_team_name: home.0.to_string(),
        home_team_score: home.1,
        home_team_points: points(home.1, away.1),
        away_team_name: away.0.to_string(),
        away_team_score: away.1,
        away_team_points: points(away.1, home.1),
        knockout_game: false,
    }
}
