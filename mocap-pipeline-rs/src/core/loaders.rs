//! Data loaders for marker trajectory tables.
//!
//! This module provides parsers for:
//! - Formatted exports (semicolon cells, multi-row header block, ragged rows)
//! - Trajectory tables with a single header row (clean and interpolated output)

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::encoding::{DecodeError, TextEncoding};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Row {row} has {found} cells but the table is {width} wide")]
    RaggedRow {
        row: usize,
        found: usize,
        width: usize,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Unparsed table as read from a formatted export.
///
/// Every row has exactly `width` cells; short rows are padded with empty
/// strings on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Cells, one `Vec` per text row.
    pub rows: Vec<Vec<String>>,
    /// Number of columns.
    pub width: usize,
}

impl RawTable {
    /// Build a table from rows, taking the width from the first row.
    ///
    /// # Errors
    ///
    /// Returns `RaggedRow` if a later row has more cells than the first.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self> {
        let width = rows.first().map_or(0, |row| row.len());
        let mut padded = Vec::with_capacity(rows.len());

        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(LoaderError::RaggedRow {
                    row: idx,
                    found: row.len(),
                    width,
                });
            }
            row.resize(width, String::new());
            padded.push(row);
        }

        Ok(Self {
            rows: padded,
            width,
        })
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row at `idx`, if any.
    #[inline]
    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(|row| row.as_slice())
    }
}

/// Table with one header row, as consumed and produced by trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrajectoryTable {
    /// Column names.
    pub headers: Vec<String>,
    /// Data rows, cells kept verbatim.
    pub rows: Vec<Vec<String>>,
}

impl TrajectoryTable {
    /// Returns the number of data rows (frames).
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of the table limited to the first `n` rows.
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

/// Read a file and decode it with `encoding`.
pub fn read_text<P: AsRef<Path>>(path: P, encoding: TextEncoding) -> Result<String> {
    let bytes = fs::read(path.as_ref())?;
    Ok(encoding.decode(&bytes)?)
}

/// Parse delimited text into a [`RawTable`].
///
/// No header handling is done here; header rows are ordinary rows. Blank
/// lines are skipped by the CSV reader.
pub fn parse_raw_table(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    RawTable::from_rows(rows)
}

/// Load a formatted export as a [`RawTable`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded, is empty, or
/// contains a row wider than its first row.
pub fn load_raw_table<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    encoding: TextEncoding,
) -> Result<RawTable> {
    let path = path.as_ref();
    let text = read_text(path, encoding)?;
    let table = parse_raw_table(&text, delimiter)?;

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(table)
}

/// Load a table with a header row, e.g. an interpolated clean table.
///
/// Rows must all have as many cells as the header.
pub fn load_trajectory_table<P: AsRef<Path>>(
    path: P,
    delimiter: u8,
    encoding: TextEncoding,
) -> Result<TrajectoryTable> {
    let path = path.as_ref();
    let text = read_text(path, encoding)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(TrajectoryTable { headers, rows })
}
