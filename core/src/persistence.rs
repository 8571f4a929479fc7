//! Persisted records and the save slot abstraction.
//!
//! Learned tables and accuracy statistics are keyed by [`GameModeIdentity`]
//! and stored together in a single [`SaveData`] document. The on-disk format
//! belongs to whichever [`SaveSlot`] implementation an adapter provides.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GameModeIdentity, ACCURACY_GRID_DIMENSION};

/// Sentinel stored for buckets that never received a spawn.
const NO_RECORD: i64 = -1;

/// Flattened action-value table of a single game mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QTableRecord {
    /// Game mode that trained the table.
    pub identity: GameModeIdentity,
    /// Number of rows in the square table.
    pub rows: usize,
    /// Number of columns in the square table.
    pub columns: usize,
    /// Row-major action values.
    pub values: Vec<f32>,
    /// Row-major count of updates applied to each entry.
    #[serde(default)]
    pub training_samples: Vec<u32>,
    /// Total number of updates applied to the table.
    #[serde(default)]
    pub total_training_samples: u64,
}

impl QTableRecord {
    /// Reports whether the stored table has the requested shape.
    #[must_use]
    pub fn matches_shape(&self, rows: usize, columns: usize) -> bool {
        self.rows == rows && self.columns == columns && self.values.len() == rows * columns
    }
}

/// One row of a 5x5 accuracy report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRow {
    /// Spawns per bucket, `-1` when nothing spawned there.
    pub total_spawns: Vec<i64>,
    /// Hits per bucket.
    pub total_hits: Vec<i64>,
    /// Hit ratio per bucket, `-1.0` when nothing spawned there.
    pub accuracy: Vec<f32>,
}

impl AccuracyRow {
    fn empty(columns: usize) -> Self {
        Self {
            total_spawns: vec![NO_RECORD; columns],
            total_hits: vec![0; columns],
            accuracy: vec![NO_RECORD as f32; columns],
        }
    }

    fn calculate_accuracy(&mut self) {
        for ((spawns, hits), accuracy) in self
            .total_spawns
            .iter()
            .zip(self.total_hits.iter())
            .zip(self.accuracy.iter_mut())
        {
            if *spawns == NO_RECORD {
                continue;
            }
            *accuracy = *hits as f32 / *spawns as f32;
        }
    }

    fn merge(&mut self, other: &AccuracyRow) {
        if other.total_spawns.len() != self.total_spawns.len() {
            return;
        }
        merge_counts(&mut self.total_spawns, &other.total_spawns);
        merge_counts(&mut self.total_hits, &other.total_hits);
    }
}

fn merge_counts(into: &mut [i64], from: &[i64]) {
    for (current, incoming) in into.iter_mut().zip(from) {
        if *incoming == NO_RECORD {
            continue;
        }
        if *current == NO_RECORD {
            *current = *incoming;
        } else {
            *current += *incoming;
        }
    }
}

/// Spawn, hit and accuracy statistics aggregated onto a 5x5 grid.
///
/// Row zero holds the bottom of the spawn area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccuracyData {
    /// Aggregated rows, bottom first.
    pub rows: Vec<AccuracyRow>,
}

impl Default for AccuracyData {
    fn default() -> Self {
        Self::empty()
    }
}

impl AccuracyData {
    /// Creates a report where every bucket is unrecorded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rows: (0..ACCURACY_GRID_DIMENSION)
                .map(|_| AccuracyRow::empty(ACCURACY_GRID_DIMENSION))
                .collect(),
        }
    }

    /// Recomputes `accuracy` from the stored spawn and hit totals.
    pub fn calculate_accuracy(&mut self) {
        for row in &mut self.rows {
            row.calculate_accuracy();
        }
    }

    /// Adds the totals of `other` into this report and refreshes accuracy.
    ///
    /// Unrecorded buckets on either side do not contribute.
    pub fn merge(&mut self, other: &AccuracyData) {
        for (row, incoming) in self.rows.iter_mut().zip(&other.rows) {
            row.merge(incoming);
        }
        self.calculate_accuracy();
    }

    /// Accuracy stored at the given bucket.
    #[must_use]
    pub fn accuracy_at(&self, row: usize, column: usize) -> Option<f32> {
        self.rows.get(row)?.accuracy.get(column).copied()
    }
}

/// Accuracy statistics of a single game mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRecord {
    /// Game mode the statistics belong to.
    pub identity: GameModeIdentity,
    /// Aggregated statistics.
    pub data: AccuracyData,
}

/// Everything the spawn core persists between sessions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    /// Learned tables, one per game mode.
    #[serde(default)]
    pub q_tables: Vec<QTableRecord>,
    /// Accuracy statistics, one per game mode.
    #[serde(default)]
    pub accuracy: Vec<AccuracyRecord>,
}

impl SaveData {
    /// Finds the table stored for `identity`.
    #[must_use]
    pub fn find_q_table(&self, identity: &GameModeIdentity) -> Option<&QTableRecord> {
        self.q_tables
            .iter()
            .find(|record| &record.identity == identity)
    }

    /// Replaces the table stored for the record's identity or appends it.
    pub fn upsert_q_table(&mut self, record: QTableRecord) {
        match self
            .q_tables
            .iter_mut()
            .find(|existing| existing.identity == record.identity)
        {
            Some(existing) => *existing = record,
            None => self.q_tables.push(record),
        }
    }

    /// Finds the accuracy statistics stored for `identity`.
    #[must_use]
    pub fn find_accuracy(&self, identity: &GameModeIdentity) -> Option<&AccuracyData> {
        self.accuracy
            .iter()
            .find(|record| &record.identity == identity)
            .map(|record| &record.data)
    }

    /// Merges a session's statistics into the stored ones for `identity`.
    pub fn merge_accuracy(&mut self, identity: &GameModeIdentity, data: &AccuracyData) {
        match self
            .accuracy
            .iter_mut()
            .find(|record| &record.identity == identity)
        {
            Some(existing) => existing.data.merge(data),
            None => {
                let mut fresh = data.clone();
                fresh.calculate_accuracy();
                self.accuracy.push(AccuracyRecord {
                    identity: identity.clone(),
                    data: fresh,
                });
            }
        }
    }
}

/// Storage location that can load and store [`SaveData`].
pub trait SaveSlot {
    /// Reads the stored document; an empty slot yields [`SaveData::default`].
    fn load(&self) -> Result<SaveData, StorageError>;

    /// Replaces the stored document.
    fn store(&mut self, data: &SaveData) -> Result<(), StorageError>;
}

/// Save slot held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySlot {
    data: Option<SaveData>,
}

impl MemorySlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot that already holds `data`.
    #[must_use]
    pub fn with_data(data: SaveData) -> Self {
        Self { data: Some(data) }
    }

    /// Document currently held, if any store happened.
    #[must_use]
    pub fn data(&self) -> Option<&SaveData> {
        self.data.as_ref()
    }
}

impl SaveSlot for MemorySlot {
    fn load(&self) -> Result<SaveData, StorageError> {
        Ok(self.data.clone().unwrap_or_default())
    }

    fn store(&mut self, data: &SaveData) -> Result<(), StorageError> {
        self.data = Some(data.clone());
        Ok(())
    }
}

/// Errors raised while reading or writing a save slot.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying storage could not be accessed.
    #[error("save slot is unavailable: {0}")]
    Io(#[from] std::io::Error),
    /// The stored document could not be decoded or encoded.
    #[error("save slot contents are malformed: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },
}
