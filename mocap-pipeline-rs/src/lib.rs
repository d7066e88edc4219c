//! Motion-capture trajectory cleaning pipeline.
//!
//! This crate provides tools for:
//! - Formatting raw comma-separated capture exports into padded tables
//! - Resolving the two-row marker header block of a formatted export
//! - Filling base-marker gaps from auxiliary markers (parallel over files)
//! - Trimming recordings after the last significant movement
//!
//! # Example
//!
//! ```no_run
//! use mocap_pipeline::{processors::reconcile::clean_file, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let summary = clean_file(
//!     Path::new("Daten_Raw_Formatted/Kreis/p01.csv"),
//!     Path::new("Daten_Clean/Kreis/p01.csv"),
//!     &config,
//! )
//! .unwrap();
//! println!("filled {} samples", summary.filled);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{IoConfig, PartitionConfig, PipelineConfig, TaskGroup, TrimConfig};
pub use core::loaders::{RawTable, TrajectoryTable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
