//! Core data types and I/O operations.

pub mod encoding;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use encoding::{DecodeError, TextEncoding};
pub use loaders::{LoaderError, RawTable, TrajectoryTable};
pub use writers::{format_value, write_table, WriteError};
