pub mod partitioned;
pub mod table;

use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::model::TransformedGame;

pub use self::partitioned::{ParquetSink, read_dataset};
pub use self::table::{TableSink, load_staged_games, open_db};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub rows_written: usize,
    pub partitions_written: usize,
}

/// Destination for one run's transformed games. Every write replaces what the
/// backend held for the affected partitions (or the whole table).
pub trait GameSink {
    fn backend(&self) -> StoreBackend;

    fn write(&mut self, rows: &[TransformedGame]) -> Result<SinkReport, StoreError>;
}
