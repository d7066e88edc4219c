//! Movement-based trimming of trajectory recordings.
//!
//! A recording often keeps running after the subject has stopped moving.
//! The mean frame-to-frame displacement over a trailing window is used as a
//! movement signal; everything after the last frame whose signal exceeds the
//! threshold is cut.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use super::batch::{plan_tasks, run_batch, BatchReport, FailureKind, FileFailure};
use crate::config::{IoConfig, TrimConfig};
use crate::core::encoding::TextEncoding;
use crate::core::loaders::{load_trajectory_table, LoaderError, TrajectoryTable};
use crate::core::transforms::{frame_distances, last_index_above, parse_val, rolling_mean};
use crate::core::writers::{write_table, WriteError};

/// Suffix appended to the stem of trimmed files.
pub const TRIMMED_SUFFIX: &str = "_trimmed";

/// Substrings that identify marker coordinate columns.
const AXIS_MARKERS: [&str; 3] = ["_X", "_Y", "_Z"];

/// Errors that can occur while trimming.
#[derive(Debug, Error)]
pub enum TrimError {
    #[error("failed to load table: {0}")]
    Load(#[from] LoaderError),

    #[error("failed to write trimmed table: {0}")]
    Write(#[from] WriteError),

    #[error("window size must be at least 1")]
    InvalidWindow,
}

impl TrimError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TrimError::Load(LoaderError::Decode(_)) => FailureKind::Decode,
            TrimError::Load(LoaderError::Io(_)) => FailureKind::Io,
            TrimError::Load(_) => FailureKind::SchemaMismatch,
            TrimError::Write(WriteError::Encode { .. }) => FailureKind::Decode,
            TrimError::Write(_) => FailureKind::Io,
            TrimError::InvalidWindow => FailureKind::SchemaMismatch,
        }
    }
}

impl From<TrimError> for FileFailure {
    fn from(err: TrimError) -> Self {
        FileFailure::new(err.kind(), err.to_string())
    }
}

/// What trimming did to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    pub original_frames: usize,
    pub kept_frames: usize,
    /// Last frame whose rolling movement exceeded the threshold.
    pub last_active: Option<usize>,
}

impl TrimOutcome {
    /// True if frames were removed.
    pub fn truncated(&self) -> bool {
        self.kept_frames < self.original_frames
    }
}

/// Per-frame movement signal, exposed for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementProfile {
    pub distances: Vec<Option<f64>>,
    pub rolling_mean: Vec<Option<f64>>,
}

/// Indices of columns whose header names a marker axis.
pub fn marker_column_indices(headers: &[String]) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| AXIS_MARKERS.iter().any(|axis| h.contains(axis)))
        .map(|(idx, _)| idx)
        .collect()
}

/// Compute frame distances and their rolling mean.
pub fn movement_profile(
    table: &TrajectoryTable,
    window_size: usize,
) -> Result<MovementProfile, TrimError> {
    if window_size == 0 {
        return Err(TrimError::InvalidWindow);
    }

    let cols = marker_column_indices(&table.headers);
    let frames: Vec<Vec<Option<f64>>> = table
        .rows
        .iter()
        .map(|row| {
            cols.iter()
                .map(|&c| row.get(c).and_then(|cell| parse_val(cell)))
                .collect()
        })
        .collect();

    let distances = frame_distances(&frames);
    let rolling_mean = rolling_mean(&distances, window_size);

    Ok(MovementProfile {
        distances,
        rolling_mean,
    })
}

/// Cut a table after its last frame of significant movement.
///
/// Header and kept cells are returned verbatim. If no frame exceeds the
/// threshold the table is returned unchanged.
pub fn trim_table(
    table: &TrajectoryTable,
    config: &TrimConfig,
) -> Result<(TrajectoryTable, TrimOutcome), TrimError> {
    let profile = movement_profile(table, config.window_size)?;
    let last_active = last_index_above(&profile.rolling_mean, config.movement_threshold);

    let kept_frames = match last_active {
        Some(idx) => {
            log::info!("Truncated at frame {} (of {})", idx, table.len());
            idx + 1
        }
        None => {
            log::warn!("No truncation, kept full recording");
            table.len()
        }
    };

    let outcome = TrimOutcome {
        original_frames: table.len(),
        kept_frames,
        last_active,
    };

    Ok((table.truncated(kept_frames), outcome))
}

/// Trim a single UTF-8 table file.
pub fn trim_file(
    input: &Path,
    output: &Path,
    config: &TrimConfig,
    io: &IoConfig,
) -> Result<TrimOutcome, TrimError> {
    let delimiter = io.delimiter_byte();
    let table = load_trajectory_table(input, delimiter, TextEncoding::Utf8)?;
    let (trimmed, outcome) = trim_table(&table, config)?;

    write_table(
        output,
        &trimmed.headers,
        &trimmed.rows,
        delimiter,
        TextEncoding::Utf8,
    )?;

    Ok(outcome)
}

/// Trim every CSV file below `input_dir`.
///
/// Outputs mirror the input layout with a `_trimmed` stem suffix.
pub fn trim_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: &TrimConfig,
    io: &IoConfig,
    limit: Option<usize>,
) -> Result<BatchReport<TrimOutcome>> {
    let tasks = plan_tasks(input_dir, output_dir, Some(TRIMMED_SUFFIX), limit)?;
    Ok(run_batch(&tasks, |input, output| {
        trim_file(input, output, config, io).map_err(FileFailure::from)
    }))
}
