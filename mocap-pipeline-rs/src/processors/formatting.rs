//! Raw export formatting.
//!
//! Capture software writes comma-separated exports whose rows vary in
//! length: a block of metadata lines, a `TRAJECTORIES` anchor line, then the
//! marker header and frame rows. Formatting pads every row to a common
//! width and switches to the pipeline delimiter so the result can be read
//! as a rectangular table.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use super::batch::{plan_tasks, run_batch, BatchReport, FailureKind, FileFailure};
use crate::config::IoConfig;
use crate::core::loaders::{read_text, LoaderError};
use crate::core::writers::{write_text, WriteError};

/// Line that separates metadata from trajectory data.
pub const ANCHOR: &str = "TRAJECTORIES";

/// Field separator of raw exports.
const RAW_DELIMITER: char = ',';

/// Errors that can occur while formatting a raw export.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to read export: {0}")]
    Load(#[from] LoaderError),

    #[error("'TRAJECTORIES' anchor not found")]
    AnchorNotFound,

    #[error("no field rows after the 'TRAJECTORIES' anchor")]
    NoFieldRows,

    #[error("failed to write formatted export: {0}")]
    Write(#[from] WriteError),
}

impl FormatError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FormatError::Load(LoaderError::Decode(_)) => FailureKind::Decode,
            FormatError::Load(_) => FailureKind::Io,
            FormatError::AnchorNotFound => FailureKind::HeaderNotFound,
            FormatError::NoFieldRows => FailureKind::SchemaMismatch,
            FormatError::Write(WriteError::Encode { .. }) => FailureKind::Decode,
            FormatError::Write(_) => FailureKind::Io,
        }
    }
}

impl From<FormatError> for FileFailure {
    fn from(err: FormatError) -> Self {
        FileFailure::new(err.kind(), err.to_string())
    }
}

/// Shape of a formatted export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSummary {
    /// Output lines, anchor included.
    pub lines: usize,
    /// Common cell count of every output line.
    pub width: usize,
}

fn padded(parts: Vec<&str>, width: usize, delimiter: char) -> String {
    let missing = width.saturating_sub(parts.len());
    let mut line = parts.join(&delimiter.to_string());
    line.extend(std::iter::repeat(delimiter).take(missing));
    line
}

/// Reformat raw export text.
///
/// Lines are stripped and blank lines dropped. Field lines after the anchor
/// are split on `,` and padded to the widest one. Metadata lines with commas
/// are split and padded the same way; those without are extended by
/// `width - 1` delimiters. Output lines end with `\n`.
pub fn format_text(text: &str, delimiter: char) -> Result<String, FormatError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let anchor = lines
        .iter()
        .position(|line| *line == ANCHOR)
        .ok_or(FormatError::AnchorNotFound)?;

    let fields: Vec<Vec<&str>> = lines[anchor + 1..]
        .iter()
        .map(|line| line.split(RAW_DELIMITER).collect())
        .collect();

    let width = fields
        .iter()
        .map(Vec::len)
        .max()
        .ok_or(FormatError::NoFieldRows)?;
    let fill: String = std::iter::repeat(delimiter).take(width - 1).collect();

    let mut out = String::new();
    for line in &lines[..anchor] {
        if line.contains(RAW_DELIMITER) {
            out.push_str(&padded(line.split(RAW_DELIMITER).collect(), width, delimiter));
        } else {
            out.push_str(line);
            out.push_str(&fill);
        }
        out.push('\n');
    }

    out.push_str(ANCHOR);
    out.push_str(&fill);
    out.push('\n');

    for parts in fields {
        out.push_str(&padded(parts, width, delimiter));
        out.push('\n');
    }

    Ok(out)
}

/// Format one raw export, keeping its encoding.
pub fn format_file(input: &Path, output: &Path, io: &IoConfig) -> Result<FormatSummary, FormatError> {
    let text = read_text(input, io.encoding)?;
    let formatted = format_text(&text, io.delimiter)?;

    let summary = FormatSummary {
        lines: formatted.lines().count(),
        width: formatted
            .lines()
            .last()
            .map_or(0, |line| line.matches(io.delimiter).count() + 1),
    };

    write_text(output, &formatted, io.encoding)?;
    Ok(summary)
}

/// Format every CSV file below `input_dir`, mirroring paths.
pub fn format_batch(
    input_dir: &Path,
    output_dir: &Path,
    io: &IoConfig,
    limit: Option<usize>,
) -> Result<BatchReport<FormatSummary>> {
    let tasks = plan_tasks(input_dir, output_dir, None, limit)?;
    Ok(run_batch(&tasks, |input, output| {
        format_file(input, output, io).map_err(FileFailure::from)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RAW: &str = "NO_OF_FRAMES\t3\r\n\
                       FREQUENCY,200\r\n\
                       \r\n\
                       TRAJECTORIES\r\n\
                       ,*1,,,*2\r\n\
                       Field #,X,Y,Z,X,Y,Z\r\n\
                       1,1.0,2.0,3.0\r\n";

    #[test]
    fn test_format_text_pads_rows() {
        let out = format_text(RAW, ';').unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines,
            vec![
                "NO_OF_FRAMES\t3;;;;;;",
                "FREQUENCY;200;;;;;",
                "TRAJECTORIES;;;;;;",
                ";*1;;;*2;;",
                "Field #;X;Y;Z;X;Y;Z",
                "1;1.0;2.0;3.0;;;",
            ]
        );
        assert!(out.ends_with('\n'));
        assert!(lines.iter().all(|l| l.matches(';').count() == 6));
    }

    #[test]
    fn test_format_text_wide_metadata_line_is_not_cut() {
        let raw = "A,B,C,D\nTRAJECTORIES\n1,2\n";
        let out = format_text(raw, ';').unwrap();
        assert_eq!(out, "A;B;C;D\nTRAJECTORIES;\n1;2\n");
    }

    #[test]
    fn test_format_text_anchor_must_be_whole_line() {
        let err = format_text("TRAJECTORIES,1\n1,2\n", ';').unwrap_err();
        assert!(matches!(err, FormatError::AnchorNotFound));
        assert_eq!(err.kind(), FailureKind::HeaderNotFound);
    }

    #[test]
    fn test_format_text_without_field_rows() {
        let err = format_text("meta\nTRAJECTORIES\n\n", ';').unwrap_err();
        assert!(matches!(err, FormatError::NoFieldRows));
    }

    #[test]
    fn test_format_file_keeps_cp1252() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("raw.csv");
        let output = temp_dir.path().join("formatted").join("raw.csv");
        fs::write(&input, b"Pr\xE4zision\nTRAJECTORIES\n1,2,3\n").unwrap();

        let summary = format_file(&input, &output, &IoConfig::default()).unwrap();

        assert_eq!(summary, FormatSummary { lines: 3, width: 3 });
        assert_eq!(
            fs::read(&output).unwrap(),
            b"Pr\xE4zision;;\nTRAJECTORIES;;\n1;2;3\n".to_vec()
        );
    }

    #[test]
    fn test_format_file_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("raw.csv");
        let output = temp_dir.path().join("out.csv");
        fs::write(&input, b"\x81\nTRAJECTORIES\n1\n").unwrap();

        let err = format_file(&input, &output, &IoConfig::default()).unwrap_err();

        assert_eq!(err.kind(), FailureKind::Decode);
        assert!(!output.exists());
    }

    #[test]
    fn test_formatted_export_resolves_header() {
        use crate::core::loaders::parse_raw_table;
        use crate::processors::header::resolve_header;

        let out = format_text(RAW, ';').unwrap();
        let table = parse_raw_table(&out, b';').unwrap();
        let header = resolve_header(&table).unwrap();

        assert_eq!(header.marker_row, 3);
        assert_eq!(header.columns.len(), 7);
    }

    #[test]
    fn test_format_batch() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("raw");
        fs::create_dir_all(input_dir.join("PTP")).unwrap();
        fs::write(input_dir.join("PTP").join("a.csv"), RAW).unwrap();
        fs::write(input_dir.join("b.csv"), "no anchor\n").unwrap();

        let report = format_batch(
            &input_dir,
            &temp_dir.path().join("formatted"),
            &IoConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.success_count(), 1);
        assert_eq!(
            report.failures_by_kind().get(&FailureKind::HeaderNotFound),
            Some(&1)
        );
        assert!(temp_dir.path().join("formatted/PTP/a.csv").exists());
    }
}
