//! Data writers for delimited trajectory tables.
//!
//! Tables are rendered to memory with the `csv` writer and then encoded,
//! so clean output keeps the encoding of the export it came from.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::encoding::{DecodeError, TextEncoding};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Text cannot be represented in the target encoding.
    #[error("cannot encode '{path}': {source}")]
    Encode {
        path: String,
        #[source]
        source: DecodeError,
    },

    /// A row does not match the header width.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Render a numeric cell. Missing values become empty cells.
///
/// Uses the shortest representation that reads back to the same value and
/// always carries a decimal point for finite values (`10.0`, `127228.226`).
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => String::new(),
    }
}

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Encode `text` and write it to `path`, creating parent directories.
pub fn write_text(path: &Path, text: &str, encoding: TextEncoding) -> Result<()> {
    let bytes = encoding.encode(text).map_err(|e| WriteError::Encode {
        path: path.display().to_string(),
        source: e,
    })?;

    ensure_parent_dirs(path)?;
    fs::write(path, bytes).map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Render a header and rows as delimited text.
///
/// Every row must be as wide as the header.
pub fn render_table<S: AsRef<str>>(
    headers: &[S],
    rows: &[Vec<String>],
    delimiter: u8,
) -> Result<String> {
    let path_str = "<memory>".to_string();
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    csv_writer
        .write_record(headers.iter().map(|h| h.as_ref()))
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (idx, row) in rows.iter().enumerate() {
        if row.len() != headers.len() {
            return Err(WriteError::RowWidth {
                row: idx,
                found: row.len(),
                expected: headers.len(),
            });
        }
        csv_writer
            .write_record(row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    let bytes = csv_writer.into_inner().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e.into_error(),
    })?;

    // The csv writer only ever receives `&str` input.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a header and rows as a delimited file.
///
/// # Example
///
/// ```no_run
/// use mocap_pipeline::core::encoding::TextEncoding;
/// use mocap_pipeline::core::writers::write_table;
/// use std::path::Path;
///
/// let headers = ["Frame", "1_X"];
/// let rows = vec![vec!["1".to_string(), "10.0".to_string()]];
/// write_table(Path::new("out.csv"), &headers, &rows, b';', TextEncoding::Utf8).unwrap();
/// ```
pub fn write_table<S: AsRef<str>>(
    path: &Path,
    headers: &[S],
    rows: &[Vec<String>],
    delimiter: u8,
    encoding: TextEncoding,
) -> Result<()> {
    let text = render_table(headers, rows, delimiter)?;
    write_text(path, &text, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(10.0)), "10.0");
        assert_eq!(format_value(Some(127228.226)), "127228.226");
        assert_eq!(format_value(Some(-0.5)), "-0.5");
        assert_eq!(format_value(None), "");
    }

    #[test]
    fn test_render_table() {
        let rows = vec![
            vec!["1".to_string(), "10.0".to_string()],
            vec!["2".to_string(), String::new()],
        ];
        let text = render_table(&["Frame", "1_X"], &rows, b';').unwrap();
        assert_eq!(text, "Frame;1_X\n1;10.0\n2;\n");
    }

    #[test]
    fn test_render_table_width_mismatch() {
        let rows = vec![vec!["1".to_string()]];
        let err = render_table(&["Frame", "1_X"], &rows, b';').unwrap_err();
        assert!(matches!(
            err,
            WriteError::RowWidth {
                row: 0,
                found: 1,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_write_table_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.csv");
        let rows = vec![vec!["1".to_string(), "2.5".to_string()]];

        write_table(&path, &["Frame", "1_X"], &rows, b';', TextEncoding::Utf8).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("Frame;1_X"));
    }

    #[test]
    fn test_write_text_cp1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_text(&path, "Präzision\n", TextEncoding::Windows1252).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"Pr\xE4zision\n");
    }

    #[test]
    fn test_write_text_unencodable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let err = write_text(&path, "Ω", TextEncoding::Windows1252).unwrap_err();
        assert!(matches!(err, WriteError::Encode { .. }));
        assert!(!path.exists());
    }
}
