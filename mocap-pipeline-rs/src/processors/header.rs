//! Marker header resolution.
//!
//! Formatted exports carry a two-row header block somewhere below their
//! metadata: a marker-id row with tags like `*1`, `*2`, ... and, directly
//! beneath it, a coordinate row with `X`/`Y`/`Z` and a `Field #` frame label.
//! A tag names the marker for the axis columns that follow it, so labels are
//! derived by folding over the columns with the most recent tag as state.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::core::loaders::RawTable;

/// Substring that marks the start of the header block.
const FIRST_MARKER_TAG: &str = "*1";

/// Errors that can occur while resolving the header block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("no row contains the first marker tag '*1'")]
    HeaderNotFound,

    #[error("marker row {marker_row} is the last row; no coordinate row follows")]
    MissingCoordinateRow { marker_row: usize },
}

/// Coordinate axis of a marker column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in column order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Parse an exact coordinate label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "X" => Some(Axis::X),
            "Y" => Some(Axis::Y),
            "Z" => Some(Axis::Z),
            _ => None,
        }
    }

    /// Position within a triplet.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic label of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnLabel {
    /// Frame index column.
    Frame,
    /// One axis of a marker trajectory.
    Marker { id: u32, axis: Axis },
    /// Anything else, qualified by its column index.
    Unknown(usize),
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Frame => f.write_str("Frame"),
            ColumnLabel::Marker { id, axis } => write!(f, "{}_{}", id, axis),
            ColumnLabel::Unknown(idx) => write!(f, "unknown_{}", idx),
        }
    }
}

/// Column labels, index-aligned with the raw table.
pub type ColumnSpec = Vec<ColumnLabel>;

/// Location and interpretation of the header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Row holding the `*<id>` marker tags.
    pub marker_row: usize,
    /// Row holding the axis labels; always `marker_row + 1`.
    pub coord_row: usize,
    /// One label per column.
    pub columns: ColumnSpec,
}

impl HeaderBlock {
    /// Index of the first data row.
    #[inline]
    pub fn first_data_row(&self) -> usize {
        self.coord_row + 1
    }
}

fn marker_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\*(\d+)").expect("marker tag pattern is valid"))
}

/// Parse a marker tag such as `*3` at the start of a cell.
///
/// Returns `None` for cells without a tag or with an id too large for `u32`.
pub fn parse_marker_tag(cell: &str) -> Option<u32> {
    marker_tag_pattern()
        .captures(cell.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Find the first row with a cell containing `*1`.
pub fn locate_marker_row(table: &RawTable) -> Option<usize> {
    table
        .rows
        .iter()
        .position(|row| row.iter().any(|cell| cell.contains(FIRST_MARKER_TAG)))
}

/// Classify one column given the marker carried over from the left.
///
/// Returns the label and the marker to carry into the next column.
fn classify_column(
    index: usize,
    tag_cell: &str,
    coord_cell: &str,
    current: Option<u32>,
) -> (ColumnLabel, Option<u32>) {
    let coord = coord_cell.trim();

    if coord.to_lowercase().starts_with("field") {
        return (ColumnLabel::Frame, current);
    }

    let current = parse_marker_tag(tag_cell).or(current);

    let label = match (current, Axis::from_label(coord)) {
        (Some(id), Some(axis)) => ColumnLabel::Marker { id, axis },
        _ => ColumnLabel::Unknown(index),
    };

    (label, current)
}

/// Derive column labels from the marker-id and coordinate rows.
///
/// The rows are zipped column by column; a shorter row is treated as
/// having empty cells at the end.
pub fn derive_column_spec<S: AsRef<str>>(marker_row: &[S], coord_row: &[S]) -> ColumnSpec {
    let width = marker_row.len().max(coord_row.len());
    let cell = |row: &[S], idx: usize| row.get(idx).map_or("", |c| c.as_ref()).to_string();

    let (columns, _) = (0..width).fold(
        (Vec::with_capacity(width), None),
        |(mut columns, current), idx| {
            let (label, next) =
                classify_column(idx, &cell(marker_row, idx), &cell(coord_row, idx), current);
            columns.push(label);
            (columns, next)
        },
    );

    columns
}

/// Locate the header block of a raw table and label its columns.
///
/// # Errors
///
/// - `HeaderNotFound` if no row contains `*1`
/// - `MissingCoordinateRow` if the marker row is the last row
pub fn resolve_header(table: &RawTable) -> Result<HeaderBlock, HeaderError> {
    let marker_row = locate_marker_row(table).ok_or(HeaderError::HeaderNotFound)?;
    let coord_row = marker_row + 1;

    let coords = table
        .row(coord_row)
        .ok_or(HeaderError::MissingCoordinateRow { marker_row })?;
    let tags = table.row(marker_row).unwrap_or_default();

    let mut columns = derive_column_spec(tags, coords);
    columns.truncate(table.width);

    log::debug!(
        "header block at rows {}/{}: {} columns",
        marker_row,
        coord_row,
        columns.len()
    );

    Ok(HeaderBlock {
        marker_row,
        coord_row,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::parse_raw_table;

    fn labels(spec: &[ColumnLabel]) -> Vec<String> {
        spec.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_parse_marker_tag() {
        assert_eq!(parse_marker_tag("*1"), Some(1));
        assert_eq!(parse_marker_tag(" *12 "), Some(12));
        assert_eq!(parse_marker_tag("Subject:*3"), None);
        assert_eq!(parse_marker_tag("*"), None);
        assert_eq!(parse_marker_tag("*99999999999"), None);
    }

    #[test]
    fn test_locate_marker_row_substring() {
        let table = parse_raw_table("TRAJECTORIES;;\n200;;\nfoo*10;;\nX;Y;Z\n", b';').unwrap();
        assert_eq!(locate_marker_row(&table), Some(2));
    }

    #[test]
    fn test_resolve_header_basic() {
        let text = "TRAJECTORIES;;;;;;;\n\
                    200;;;;;;;\n\
                    ;*1;;;*2;;;\n\
                    Field #;X;Y;Z;X;Y;Z;\n\
                    1;1.0;2.0;3.0;4.0;5.0;6.0;\n";
        let table = parse_raw_table(text, b';').unwrap();
        let header = resolve_header(&table).unwrap();

        assert_eq!(header.marker_row, 2);
        assert_eq!(header.coord_row, header.marker_row + 1);
        assert_eq!(header.first_data_row(), 4);
        assert_eq!(
            labels(&header.columns),
            vec!["Frame", "1_X", "1_Y", "1_Z", "2_X", "2_Y", "2_Z", "unknown_7"]
        );
        assert_eq!(header.columns.len(), table.width);
    }

    #[test]
    fn test_resolve_header_not_found() {
        let table = parse_raw_table("a;b\nX;Y\n", b';').unwrap();
        assert_eq!(resolve_header(&table), Err(HeaderError::HeaderNotFound));
    }

    #[test]
    fn test_resolve_header_missing_coordinate_row() {
        let table = parse_raw_table("a;b\n*1;\n", b';').unwrap();
        assert_eq!(
            resolve_header(&table),
            Err(HeaderError::MissingCoordinateRow { marker_row: 1 })
        );
    }

    #[test]
    fn test_field_column_does_not_update_marker() {
        let spec = derive_column_spec(
            &["*1", "", "*2", "", "", ""],
            &["X", "Y", "Field", "X", "Y", "Z"],
        );
        assert_eq!(labels(&spec), vec!["1_X", "1_Y", "Frame", "1_X", "1_Y", "1_Z"]);
    }

    #[test]
    fn test_tag_column_without_axis_is_placeholder() {
        let spec = derive_column_spec(
            &["", "*1", "", "", "", "*2", "", "", ""],
            &["Field #", "", "X", "Y", "Z", "", "X", "Y", "Z"],
        );
        assert_eq!(
            labels(&spec),
            vec!["Frame", "unknown_1", "1_X", "1_Y", "1_Z", "unknown_5", "2_X", "2_Y", "2_Z"]
        );
    }

    #[test]
    fn test_axis_before_any_marker_is_unknown() {
        let spec = derive_column_spec(&["", "", "*1"], &["X", "Y", "Z"]);
        assert_eq!(labels(&spec), vec!["unknown_0", "unknown_1", "1_Z"]);
    }

    #[test]
    fn test_axis_labels_are_case_sensitive_but_trimmed() {
        let spec = derive_column_spec(&["*4", "", ""], &[" X ", "y", "FIELD"]);
        assert_eq!(labels(&spec), vec!["4_X", "unknown_1", "Frame"]);
    }

    #[test]
    fn test_unknown_labels_never_collide() {
        let spec = derive_column_spec(&["", "", "", ""], &["a", "b", "a", "b"]);
        let mut seen = std::collections::HashSet::new();
        assert!(spec.iter().all(|label| seen.insert(*label)));
        assert_eq!(spec.len(), 4);
    }

    #[test]
    fn test_uneven_header_rows() {
        let spec = derive_column_spec(&["*1"], &["X", "Y", "Z"]);
        assert_eq!(labels(&spec), vec!["1_X", "1_Y", "1_Z"]);
    }
}
