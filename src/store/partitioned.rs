use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::basic::Compression;
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, Int32Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::record::RowAccessor;
use parquet::schema::parser::parse_message_type;
use tracing::{debug, info};

use super::{GameSink, SinkReport};
use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::model::TransformedGame;

const SEASON_KEY: &str = "season_name";
const MATCHDAY_KEY: &str = "matchday";
const PART_FILE: &str = "part-0.parquet";
const STAGING_EXT: &str = "staging";
const RETIRED_EXT: &str = "old";

// Partition columns live in the directory names, not in the files.
const GAMES_SCHEMA: &str = r#"
message transformed_game {
    REQUIRED BYTE_ARRAY game_id (UTF8);
    REQUIRED BYTE_ARRAY date_time_utc (UTF8);
    REQUIRED BYTE_ARRAY home_team_name (UTF8);
    REQUIRED INT32 home_team_score;
    REQUIRED INT32 home_team_points;
    REQUIRED BYTE_ARRAY away_team_name (UTF8);
    REQUIRED INT32 away_team_score;
    REQUIRED INT32 away_team_points;
    REQUIRED BOOLEAN knockout_game;
}
"#;

pub struct ParquetSink {
    root: PathBuf,
}

impl ParquetSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl GameSink for ParquetSink {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Parquet
    }

    /// Every season present in `rows` is rebuilt whole and swapped in, so
    /// matchday folders from an earlier run of that season cannot linger.
    /// Seasons absent from `rows` are left as they are.
    fn write(&mut self, rows: &[TransformedGame]) -> Result<SinkReport, StoreError> {
        let mut seasons: BTreeMap<&str, BTreeMap<i32, Vec<&TransformedGame>>> = BTreeMap::new();
        for row in rows {
            seasons
                .entry(row.season_name.as_str())
                .or_default()
                .entry(row.matchday)
                .or_default()
                .push(row);
        }

        let mut partitions_written = 0;
        for (season, matchdays) in seasons.iter_mut() {
            for part_rows in matchdays.values_mut() {
                part_rows.sort_by(|a, b| a.game_id.cmp(&b.game_id));
            }
            write_season(&self.root, season, matchdays)?;
            partitions_written += matchdays.len();
        }

        info!(
            "[STORE] wrote {} rows into {} partitions across {} seasons under {}",
            rows.len(),
            partitions_written,
            seasons.len(),
            self.root.display()
        );
        Ok(SinkReport {
            rows_written: rows.len(),
            partitions_written,
        })
    }
}

pub fn season_dir(root: &Path, season_name: &str) -> PathBuf {
    root.join(format!("{SEASON_KEY}={}", encode_partition_value(season_name)))
}

pub fn partition_dir(root: &Path, season_name: &str, matchday: i32) -> PathBuf {
    season_dir(root, season_name).join(format!("{MATCHDAY_KEY}={matchday}"))
}

fn write_season(
    root: &Path,
    season_name: &str,
    matchdays: &BTreeMap<i32, Vec<&TransformedGame>>,
) -> Result<(), StoreError> {
    let dir = season_dir(root, season_name);
    let staging = dir.with_extension(STAGING_EXT);
    let retired = dir.with_extension(RETIRED_EXT);

    if staging.exists() {
        fs::remove_dir_all(&staging)
            .map_err(|e| StoreError::io(format!("clear {}", staging.display()), e))?;
    }
    for (matchday, rows) in matchdays {
        let part_dir = staging.join(format!("{MATCHDAY_KEY}={matchday}"));
        fs::create_dir_all(&part_dir)
            .map_err(|e| StoreError::io(format!("create {}", part_dir.display()), e))?;
        write_part_file(&part_dir.join(PART_FILE), rows)?;
        debug!("[STORE] partition {} ({} rows)", part_dir.display(), rows.len());
    }

    if dir.exists() {
        if retired.exists() {
            fs::remove_dir_all(&retired)
                .map_err(|e| StoreError::io(format!("clear {}", retired.display()), e))?;
        }
        fs::rename(&dir, &retired)
            .map_err(|e| StoreError::io(format!("retire {}", dir.display()), e))?;
        fs::rename(&staging, &dir)
            .map_err(|e| StoreError::io(format!("swap in {}", dir.display()), e))?;
        fs::remove_dir_all(&retired)
            .map_err(|e| StoreError::io(format!("remove {}", retired.display()), e))?;
    } else {
        fs::rename(&staging, &dir)
            .map_err(|e| StoreError::io(format!("swap in {}", dir.display()), e))?;
    }
    Ok(())
}

enum ColumnData {
    Utf8(Vec<ByteArray>),
    Int32(Vec<i32>),
    Bool(Vec<bool>),
}

/// Column vectors in `GAMES_SCHEMA` order.
fn column_data(rows: &[&TransformedGame]) -> Vec<ColumnData> {
    vec![
        utf8_column(rows, |r| r.game_id.as_str()),
        utf8_column(rows, |r| r.date_time_utc.as_str()),
        utf8_column(rows, |r| r.home_team_name.as_str()),
        ColumnData::Int32(rows.iter().map(|r| r.home_team_score).collect()),
        ColumnData::Int32(rows.iter().map(|r| r.home_team_points).collect()),
        utf8_column(rows, |r| r.away_team_name.as_str()),
        ColumnData::Int32(rows.iter().map(|r| r.away_team_score).collect()),
        ColumnData::Int32(rows.iter().map(|r| r.away_team_points).collect()),
        ColumnData::Bool(rows.iter().map(|r| r.knockout_game).collect()),
    ]
}

fn utf8_column(
    rows: &[&TransformedGame],
    field: impl Fn(&TransformedGame) -> &str,
) -> ColumnData {
    ColumnData::Utf8(rows.iter().map(|r| ByteArray::from(field(*r))).collect())
}

fn write_part_file(path: &Path, rows: &[&TransformedGame]) -> Result<(), StoreError> {
    let schema = Arc::new(
        parse_message_type(GAMES_SCHEMA).map_err(|e| StoreError::parquet("parse games schema", e))?,
    );
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build(),
    );
    let file =
        File::create(path).map_err(|e| StoreError::io(format!("create {}", path.display()), e))?;
    let ctx = |what: &str| format!("{what} {}", path.display());

    let mut writer = SerializedFileWriter::new(file, schema, props)
        .map_err(|e| StoreError::parquet(ctx("open writer"), e))?;
    let mut row_group = writer
        .next_row_group()
        .map_err(|e| StoreError::parquet(ctx("start row group"), e))?;

    let mut columns = column_data(rows).into_iter();
    while let Some(mut column) = row_group
        .next_column()
        .map_err(|e| StoreError::parquet(ctx("next column"), e))?
    {
        let data = columns
            .next()
            .ok_or_else(|| StoreError::Layout(ctx("schema has more columns than rows provide")))?;
        write_column(&mut column, &data).map_err(|e| StoreError::parquet(ctx("write column"), e))?;
        column
            .close()
            .map_err(|e| StoreError::parquet(ctx("close column"), e))?;
    }

    row_group
        .close()
        .map_err(|e| StoreError::parquet(ctx("close row group"), e))?;
    writer
        .close()
        .map_err(|e| StoreError::parquet(ctx("close file"), e))?;
    Ok(())
}

fn write_column(
    column: &mut SerializedColumnWriter<'_>,
    data: &ColumnData,
) -> parquet::errors::Result<()> {
    match data {
        ColumnData::Utf8(values) => {
            column.typed::<ByteArrayType>().write_batch(values, None, None)?;
        }
        ColumnData::Int32(values) => {
            column.typed::<Int32Type>().write_batch(values, None, None)?;
        }
        ColumnData::Bool(values) => {
            column.typed::<BoolType>().write_batch(values, None, None)?;
        }
    }
    Ok(())
}

/// Reads every partition under `root`, restoring `season_name` and `matchday`
/// from the directory names. A missing root is an empty dataset.
pub fn read_dataset(root: &Path) -> Result<Vec<TransformedGame>, StoreError> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }

    for season_dir in sorted_subdirs(root)? {
        let Some(season_name) = partition_value(&season_dir, SEASON_KEY)? else {
            continue;
        };
        for matchday_dir in sorted_subdirs(&season_dir)? {
            let Some(raw_matchday) = partition_value(&matchday_dir, MATCHDAY_KEY)? else {
                continue;
            };
            let matchday = raw_matchday.parse::<i32>().map_err(|_| {
                StoreError::Layout(format!(
                    "non-integer matchday partition {}",
                    matchday_dir.display()
                ))
            })?;
            for file in sorted_parquet_files(&matchday_dir)? {
                read_part_file(&file, &season_name, matchday, &mut out)?;
            }
        }
    }
    Ok(out)
}

fn read_part_file(
    path: &Path,
    season_name: &str,
    matchday: i32,
    out: &mut Vec<TransformedGame>,
) -> Result<(), StoreError> {
    let ctx = |what: &str| format!("{what} {}", path.display());
    let file = File::open(path).map_err(|e| StoreError::io(ctx("open"), e))?;
    let reader =
        SerializedFileReader::new(file).map_err(|e| StoreError::parquet(ctx("open reader"), e))?;
    let iter = reader
        .get_row_iter(None)
        .map_err(|e| StoreError::parquet(ctx("iterate rows"), e))?;

    for row in iter {
        let row = row.map_err(|e| StoreError::parquet(ctx("decode row"), e))?;
        let decoded = (|| -> parquet::errors::Result<TransformedGame> {
            Ok(TransformedGame {
                game_id: row.get_string(0)?.clone(),
                date_time_utc: row.get_string(1)?.clone(),
                season_name: season_name.to_string(),
                matchday,
                home_team_name: row.get_string(2)?.clone(),
                home_team_score: row.get_int(3)?,
                home_team_points: row.get_int(4)?,
                away_team_name: row.get_string(5)?.clone(),
                away_team_score: row.get_int(6)?,
                away_team_points: row.get_int(7)?,
                knockout_game: row.get_bool(8)?,
            })
        })();
        out.push(decoded.map_err(|e| StoreError::parquet(ctx("read columns"), e))?);
    }
    Ok(())
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut out = Vec::new();
    let entries =
        fs::read_dir(dir).map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn sorted_parquet_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut out = Vec::new();
    let entries =
        fs::read_dir(dir).map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(format!("list {}", dir.display()), e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// `key=value` directory name to decoded value. Leftover staging or retired
/// directories from an interrupted write are skipped.
fn partition_value(dir: &Path, key: &str) -> Result<Option<String>, StoreError> {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    if name.ends_with(&format!(".{STAGING_EXT}")) || name.ends_with(&format!(".{RETIRED_EXT}")) {
        return Ok(None);
    }
    let Some(raw) = name
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
    else {
        return Err(StoreError::Layout(format!(
            "expected `{key}=` partition, found {}",
            dir.display()
        )));
    };
    decode_partition_value(raw).map(Some).ok_or_else(|| {
        StoreError::Layout(format!("bad partition encoding in {}", dir.display()))
    })
}

pub fn encode_partition_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

pub fn decode_partition_value(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = raw.get(idx + 1..idx + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            idx += 3;
        } else {
            out.push(bytes[idx]);
            idx += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_values_escape_path_separators() {
        assert_eq!(encode_partition_value("2023"), "2023");
        assert_eq!(encode_partition_value("2023/24"), "2023%2F24");
        assert_eq!(encode_partition_value("Fall 2019"), "Fall%202019");
        assert_eq!(encode_partition_value("2023.old"), "2023%2Eold");
        assert_eq!(decode_partition_value("2023%2Estaging").as_deref(), Some("2023.staging"));
        assert_eq!(decode_partition_value("2023%2F24").as_deref(), Some("2023/24"));
        assert_eq!(decode_partition_value("bad%2"), None);
    }

    #[test]
    fn staging_dirs_are_ignored() {
        let dir = Path::new("/tmp/x/matchday=3.staging");
        assert_eq!(partition_value(dir, MATCHDAY_KEY).unwrap(), None);
        let dir = Path::new("/tmp/x/matchday=3");
        assert_eq!(partition_value(dir, MATCHDAY_KEY).unwrap().as_deref(), Some("3"));
        assert!(partition_value(Path::new("/tmp/x/other"), MATCHDAY_KEY).is_err());
    }
}
