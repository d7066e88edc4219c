//! Marker reconciliation: numeric conversion and gap-filling.
//!
//! Recordings track a fixed set of base markers. When a base marker drops
//! out, the capture system often keeps tracking the same physical point as a
//! new, higher-numbered extra marker. Reconciliation moves those extra
//! samples back into vacant base-marker slots, frame by frame, and then
//! discards the extra columns.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use super::batch::{plan_tasks, run_batch, BatchReport, FailureKind, FileFailure};
use super::header::{resolve_header, Axis, ColumnLabel, HeaderBlock, HeaderError};
use crate::config::PipelineConfig;
use crate::core::loaders::{load_raw_table, LoaderError, RawTable};
use crate::core::transforms::parse_val;
use crate::core::writers::{format_value, write_table, WriteError};

/// Errors that can occur while cleaning a file.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to load table: {0}")]
    Load(#[from] LoaderError),

    #[error("header error: {0}")]
    Header(#[from] HeaderError),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("failed to write clean table: {0}")]
    Write(#[from] WriteError),
}

impl ReconcileError {
    /// Map the error onto the per-file failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            ReconcileError::Load(LoaderError::Decode(_)) => FailureKind::Decode,
            ReconcileError::Load(LoaderError::Io(_)) => FailureKind::Io,
            ReconcileError::Load(LoaderError::EmptyFile(_)) => FailureKind::HeaderNotFound,
            ReconcileError::Load(_) => FailureKind::SchemaMismatch,
            ReconcileError::Header(HeaderError::HeaderNotFound) => FailureKind::HeaderNotFound,
            ReconcileError::Header(_) => FailureKind::SchemaMismatch,
            ReconcileError::SchemaMismatch(_) => FailureKind::SchemaMismatch,
            ReconcileError::Write(WriteError::Encode { .. }) => FailureKind::Decode,
            ReconcileError::Write(_) => FailureKind::Io,
        }
    }
}

impl From<ReconcileError> for FileFailure {
    fn from(err: ReconcileError) -> Self {
        FileFailure::new(err.kind(), err.to_string())
    }
}

/// One axis of one marker across all frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerColumn {
    pub id: u32,
    pub axis: Axis,
    pub values: Vec<Option<f64>>,
}

impl MarkerColumn {
    /// Header label, e.g. `3_Y`.
    pub fn label(&self) -> String {
        ColumnLabel::Marker {
            id: self.id,
            axis: self.axis,
        }
        .to_string()
    }
}

/// Frame column plus numeric marker columns.
///
/// Columns keep their discovery order. Each `(id, axis)` pair occurs at
/// most once.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTable {
    /// Frame cells, verbatim.
    pub frames: Vec<String>,
    columns: Vec<MarkerColumn>,
    index: HashMap<(u32, Axis), usize>,
}

impl MarkerTable {
    /// Build a table, checking column lengths and uniqueness.
    pub fn new(frames: Vec<String>, columns: Vec<MarkerColumn>) -> Result<Self, ReconcileError> {
        let mut index = HashMap::with_capacity(columns.len());

        for (pos, column) in columns.iter().enumerate() {
            if column.values.len() != frames.len() {
                return Err(ReconcileError::SchemaMismatch(format!(
                    "column {} has {} values for {} frames",
                    column.label(),
                    column.values.len(),
                    frames.len()
                )));
            }
            if index.insert((column.id, column.axis), pos).is_some() {
                return Err(ReconcileError::SchemaMismatch(format!(
                    "duplicate column {}",
                    column.label()
                )));
            }
        }

        Ok(Self {
            frames,
            columns,
            index,
        })
    }

    /// Convert the data rows of a raw table using its header block.
    ///
    /// Rows after the coordinate row are data. Exactly one `Frame` column is
    /// required; unknown columns are dropped and marker cells are parsed with
    /// [`parse_val`].
    pub fn from_raw(raw: &RawTable, header: &HeaderBlock) -> Result<Self, ReconcileError> {
        if header.columns.len() != raw.width {
            return Err(ReconcileError::SchemaMismatch(format!(
                "{} column labels for a table {} columns wide",
                header.columns.len(),
                raw.width
            )));
        }

        let frame_cols: Vec<usize> = header
            .columns
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == ColumnLabel::Frame)
            .map(|(idx, _)| idx)
            .collect();

        let frame_col = match frame_cols.as_slice() {
            [single] => *single,
            [] => {
                return Err(ReconcileError::SchemaMismatch(
                    "no Frame column in header".to_string(),
                ))
            }
            many => {
                return Err(ReconcileError::SchemaMismatch(format!(
                    "{} Frame columns in header",
                    many.len()
                )))
            }
        };

        let data = raw.rows.get(header.first_data_row()..).unwrap_or_default();
        let frames = data.iter().map(|row| row[frame_col].clone()).collect();

        let columns = header
            .columns
            .iter()
            .enumerate()
            .filter_map(|(col, label)| match *label {
                ColumnLabel::Marker { id, axis } => Some(MarkerColumn {
                    id,
                    axis,
                    values: data.iter().map(|row| parse_val(&row[col])).collect(),
                }),
                _ => None,
            })
            .collect();

        Self::new(frames, columns)
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Marker columns in output order.
    pub fn columns(&self) -> &[MarkerColumn] {
        &self.columns
    }

    /// All marker ids with at least one column, ascending.
    pub fn marker_ids(&self) -> BTreeSet<u32> {
        self.columns.iter().map(|c| c.id).collect()
    }

    /// Column positions of a full X/Y/Z triplet, if all three exist.
    fn triplet(&self, id: u32) -> Option<[usize; 3]> {
        let [x, y, z] = Axis::ALL;
        Some([
            *self.index.get(&(id, x))?,
            *self.index.get(&(id, y))?,
            *self.index.get(&(id, z))?,
        ])
    }

    /// Value of one axis of a marker at a frame.
    pub fn value(&self, id: u32, axis: Axis, frame: usize) -> Option<f64> {
        let col = *self.index.get(&(id, axis))?;
        self.columns[col].values.get(frame).copied().flatten()
    }

    /// The marker's position at `frame`, present only if X, Y and Z all are.
    pub fn sample(&self, id: u32, frame: usize) -> Option<[f64; 3]> {
        let cols = self.triplet(id)?;
        Some([
            self.columns[cols[0]].values.get(frame).copied().flatten()?,
            self.columns[cols[1]].values.get(frame).copied().flatten()?,
            self.columns[cols[2]].values.get(frame).copied().flatten()?,
        ])
    }

    /// True if the marker has all three axis columns and all three are
    /// missing at `frame`.
    pub fn is_vacant(&self, id: u32, frame: usize) -> bool {
        match self.triplet(id) {
            Some(cols) => cols
                .iter()
                .all(|&col| matches!(self.columns[col].values.get(frame), Some(None))),
            None => false,
        }
    }

    fn set_sample(&mut self, id: u32, frame: usize, sample: [f64; 3]) {
        if let Some(cols) = self.triplet(id) {
            for (col, value) in cols.into_iter().zip(sample) {
                self.columns[col].values[frame] = Some(value);
            }
        }
    }

    /// Drop every column whose marker id fails `keep`.
    ///
    /// Returns the number of columns removed.
    pub fn retain_markers<F: Fn(u32) -> bool>(&mut self, keep: F) -> usize {
        let before = self.columns.len();
        self.columns.retain(|c| keep(c.id));
        self.index = self
            .columns
            .iter()
            .enumerate()
            .map(|(pos, c)| ((c.id, c.axis), pos))
            .collect();
        before - self.columns.len()
    }

    /// Header row: `Frame` followed by marker labels.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("Frame".to_string())
            .chain(self.columns.iter().map(MarkerColumn::label))
            .collect()
    }

    /// Rendered data rows, aligned with [`MarkerTable::headers`].
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.frames
            .iter()
            .enumerate()
            .map(|(frame, label)| {
                std::iter::once(label.clone())
                    .chain(self.columns.iter().map(|c| format_value(c.values[frame])))
                    .collect()
            })
            .collect()
    }
}

/// Split of a file's markers into kept and auxiliary sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPartition {
    /// Required markers, ascending.
    pub base: Vec<u32>,
    /// Discovered markers outside the base set, ascending.
    pub extra: Vec<u32>,
}

impl MarkerPartition {
    pub fn new(discovered: &BTreeSet<u32>, base_ids: &[u32]) -> Self {
        let base: BTreeSet<u32> = base_ids.iter().copied().collect();
        let extra = discovered.difference(&base).copied().collect();
        Self {
            base: base.into_iter().collect(),
            extra,
        }
    }

    #[inline]
    pub fn is_extra(&self, id: u32) -> bool {
        self.extra.binary_search(&id).is_ok()
    }
}

/// Fill vacant base-marker samples from extra markers.
///
/// For each frame, extra markers are visited in ascending id order. An
/// extra marker with a complete sample fills the lowest-id base marker that
/// is entirely missing at that frame, then the next extra marker is
/// considered. Vacancy is checked against the already-updated frame, so two
/// extra markers never fill the same base slot.
///
/// Returns the number of samples filled.
pub fn fill_gaps(table: &mut MarkerTable, partition: &MarkerPartition) -> usize {
    let mut filled = 0;

    for frame in 0..table.len() {
        for &extra in &partition.extra {
            let Some(sample) = table.sample(extra, frame) else {
                continue;
            };

            if let Some(&base) = partition
                .base
                .iter()
                .find(|&&base| table.is_vacant(base, frame))
            {
                table.set_sample(base, frame, sample);
                filled += 1;
            }
        }
    }

    filled
}

/// Statistics of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub frames: usize,
    pub base_markers: Vec<u32>,
    pub extra_markers: Vec<u32>,
    /// Samples copied from extra to base markers.
    pub filled: usize,
    /// Extra-marker columns removed.
    pub dropped_columns: usize,
}

/// Gap-fill a table and drop its extra-marker columns.
///
/// Running this on its own output changes nothing: without extra columns
/// there is nothing to fill or drop.
pub fn reconcile(table: &mut MarkerTable, base_ids: &[u32]) -> ReconcileSummary {
    let partition = MarkerPartition::new(&table.marker_ids(), base_ids);

    let filled = fill_gaps(table, &partition);
    let dropped_columns = table.retain_markers(|id| !partition.is_extra(id));

    ReconcileSummary {
        frames: table.len(),
        base_markers: partition.base,
        extra_markers: partition.extra,
        filled,
        dropped_columns,
    }
}

/// Build and reconcile the clean table of a raw export.
pub fn reconcile_raw(
    raw: &RawTable,
    header: &HeaderBlock,
    base_ids: &[u32],
) -> Result<(MarkerTable, ReconcileSummary), ReconcileError> {
    let mut table = MarkerTable::from_raw(raw, header)?;
    let summary = reconcile(&mut table, base_ids);
    Ok((table, summary))
}

/// Clean a single formatted export.
///
/// Reads `input`, resolves its header, fills base-marker gaps and writes
/// the clean table to `output`. Nothing is written on failure.
///
/// # Arguments
///
/// * `input` - Formatted export (semicolon cells, header block)
/// * `output` - Destination of the clean table
/// * `config` - Pipeline configuration (I/O settings and marker groups)
pub fn clean_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<ReconcileSummary, ReconcileError> {
    let delimiter = config.io.delimiter_byte();
    let raw = load_raw_table(input, delimiter, config.io.encoding)?;
    let header = resolve_header(&raw)?;

    let base_ids = config
        .partition
        .base_markers_for(&input.to_string_lossy());
    let (table, summary) = reconcile_raw(&raw, &header, &base_ids)?;

    log::debug!(
        "{}: base {:?}, extra {:?}, {} samples filled",
        input.display(),
        summary.base_markers,
        summary.extra_markers,
        summary.filled
    );

    write_table(
        output,
        &table.headers(),
        &table.to_rows(),
        delimiter,
        config.io.encoding,
    )?;

    Ok(summary)
}

/// Clean every CSV file below `input_dir` into `output_dir`.
///
/// Relative paths are mirrored. Failing files are reported in the returned
/// [`BatchReport`] and do not stop the batch.
pub fn clean_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    limit: Option<usize>,
) -> Result<BatchReport<ReconcileSummary>> {
    let tasks = plan_tasks(input_dir, output_dir, None, limit)?;
    Ok(run_batch(&tasks, |input, output| {
        clean_file(input, output, config).map_err(FileFailure::from)
    }))
}
