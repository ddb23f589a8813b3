use std::path::PathBuf;

use crate::error::PipelineError;

pub const MLS_API_URL: &str = "https://app.americansocceranalysis.com/api";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DB_PATH: &str = "db/mls.sqlite";
pub const DEFAULT_STAGE_NAME: &str = "Regular Season";
pub const DEFAULT_SEASON_START: u16 = 2015;
pub const DEFAULT_SEASON_END: u16 = 2025;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_PARALLELISM: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Parquet,
    Table,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "parquet" | "file" | "files" => Some(StoreBackend::Parquet),
            "table" | "sqlite" | "db" => Some(StoreBackend::Table),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StoreBackend::Parquet => "parquet",
            StoreBackend::Table => "table",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub backend: StoreBackend,
    pub seasons: Vec<String>,
    pub stage_name: Option<String>,
    pub http_timeout_secs: u64,
    pub fetch_retries: u32,
    pub fetch_parallelism: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: MLS_API_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            backend: StoreBackend::Parquet,
            seasons: season_range(DEFAULT_SEASON_START, DEFAULT_SEASON_END),
            stage_name: Some(DEFAULT_STAGE_NAME.to_string()),
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            fetch_retries: DEFAULT_RETRIES,
            fetch_parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = PipelineConfig::default();

        if let Some(url) = get("MLS_API_URL") {
            cfg.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = get("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(raw) = get("STORE_BACKEND") {
            cfg.backend = StoreBackend::parse(&raw)
                .ok_or_else(|| PipelineError::Config(format!("unknown STORE_BACKEND `{raw}`")))?;
        }

        let start = get("SEASON_START")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_SEASON_START);
        let end = get("SEASON_END")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_SEASON_END);
        cfg.seasons = if start <= end {
            season_range(start, end)
        } else {
            season_range(DEFAULT_SEASON_START, DEFAULT_SEASON_END)
        };

        match lookup("STAGE_NAME") {
            // An explicitly empty stage disables the stage filter.
            Some(raw) if raw.trim().is_empty() => cfg.stage_name = None,
            Some(raw) => cfg.stage_name = Some(raw.trim().to_string()),
            None => {}
        }

        cfg.http_timeout_secs = get("HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        cfg.fetch_retries = get("FETCH_RETRIES")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);
        cfg.fetch_parallelism = get("FETCH_PARALLELISM")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PARALLELISM)
            .clamp(2, 32);

        Ok(cfg)
    }

    pub fn games_dir(&self) -> PathBuf {
        self.data_dir.join("games")
    }
}

pub fn season_range(start: u16, end: u16) -> Vec<String> {
    (start..=end).map(|year| year.to_string()).collect()
}

/// Shared `--db <path>` / `--db=<path>` handling for the binaries.
pub fn parse_db_path_arg(args: &[String]) -> Option<PathBuf> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_cover_2015_through_2025() {
        let cfg = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.seasons.first().map(String::as_str), Some("2015"));
        assert_eq!(cfg.seasons.last().map(String::as_str), Some("2025"));
        assert_eq!(cfg.seasons.len(), 11);
        assert_eq!(cfg.backend, StoreBackend::Parquet);
        assert_eq!(cfg.stage_name.as_deref(), Some("Regular Season"));
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = PipelineConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "table"),
            ("SEASON_START", "2022"),
            ("SEASON_END", "2023"),
            ("FETCH_PARALLELISM", "100"),
            ("FETCH_RETRIES", "0"),
            ("MLS_API_URL", "http://localhost:9000/api/"),
            ("STAGE_NAME", ""),
        ]))
        .unwrap();
        assert_eq!(cfg.backend, StoreBackend::Table);
        assert_eq!(cfg.seasons, vec!["2022".to_string(), "2023".to_string()]);
        assert_eq!(cfg.fetch_parallelism, 32);
        assert_eq!(cfg.fetch_retries, 1);
        assert_eq!(cfg.api_base_url, "http://localhost:9000/api");
        assert!(cfg.stage_name.is_none());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = PipelineConfig::from_lookup(lookup(&[("STORE_BACKEND", "s3")])).unwrap_err();
        assert!(err.to_string().contains("STORE_BACKEND"));
    }

    #[test]
    fn db_arg_forms() {
        let args = vec!["--db=/tmp/a.sqlite".to_string()];
        assert_eq!(parse_db_path_arg(&args), Some(PathBuf::from("/tmp/a.sqlite")));
        let args = vec!["--db".to_string(), "b.sqlite".to_string()];
        assert_eq!(parse_db_path_arg(&args), Some(PathBuf::from("b.sqlite")));
        let args = vec!["--db".to_string()];
        assert_eq!(parse_db_path_arg(&args), None);
    }
}
