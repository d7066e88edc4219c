//! Data processing modules.

pub mod batch;
pub mod formatting;
pub mod header;
pub mod reconcile;
pub mod trimming;

// Re-export key types for convenience
pub use batch::{find_csv_files, BatchReport, FailureKind, FileFailure, FileOutcome};
pub use formatting::{format_batch, format_file, format_text, FormatError};
pub use header::{resolve_header, Axis, ColumnLabel, ColumnSpec, HeaderBlock, HeaderError};
pub use reconcile::{
    clean_batch, clean_file, fill_gaps, reconcile, MarkerPartition, MarkerTable,
    ReconcileError, ReconcileSummary,
};
pub use trimming::{trim_batch, trim_file, trim_table, TrimError, TrimOutcome};
