//! Configuration types for the trajectory cleaning pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::encoding::TextEncoding;

/// Configuration for reading and writing semicolon tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Cell delimiter of formatted and cleaned tables
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Character encoding of raw and formatted exports
    #[serde(default)]
    pub encoding: TextEncoding,
}

fn default_delimiter() -> char {
    ';'
}

impl IoConfig {
    /// Delimiter as the single byte the CSV reader expects.
    ///
    /// Non-ASCII delimiters fall back to `;`.
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b';'
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            encoding: TextEncoding::default(),
        }
    }
}

/// A recording task family and the markers it requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskGroup {
    /// Human-readable group name, used in log output only
    pub name: String,

    /// Lowercase substrings matched against the file path
    pub keywords: Vec<String>,

    /// Marker ids kept in the clean output
    pub base_markers: Vec<u32>,
}

/// Configuration for splitting markers into base and extra sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Task groups, checked in order; the first match wins
    #[serde(default = "default_task_groups")]
    pub groups: Vec<TaskGroup>,

    /// Base markers used when no group matches
    #[serde(default = "default_base_markers")]
    pub default_base_markers: Vec<u32>,
}

fn default_task_groups() -> Vec<TaskGroup> {
    vec![
        TaskGroup {
            name: "grip".to_string(),
            keywords: vec![
                "gewicht".to_string(),
                "greifen".to_string(),
                "präzision".to_string(),
            ],
            base_markers: vec![1, 2, 3, 4, 5],
        },
        TaskGroup {
            name: "point-to-point".to_string(),
            keywords: vec![
                "ptp".to_string(),
                "ptp2".to_string(),
                "ptp3".to_string(),
                "sequentiell".to_string(),
                "zickzack".to_string(),
                "kreis".to_string(),
            ],
            base_markers: vec![1],
        },
    ]
}

fn default_base_markers() -> Vec<u32> {
    vec![1]
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            groups: default_task_groups(),
            default_base_markers: default_base_markers(),
        }
    }
}

impl PartitionConfig {
    /// Find the task group whose keywords occur in `identifier`.
    ///
    /// Matching is a case-insensitive substring test.
    pub fn match_group(&self, identifier: &str) -> Option<&TaskGroup> {
        let lower = identifier.to_lowercase();
        self.groups.iter().find(|group| {
            group
                .keywords
                .iter()
                .any(|keyword| lower.contains(&keyword.to_lowercase()))
        })
    }

    /// Base marker ids for a file identifier, sorted ascending.
    ///
    /// Falls back to `default_base_markers` with a warning when no group
    /// matches.
    pub fn base_markers_for(&self, identifier: &str) -> Vec<u32> {
        let mut markers = match self.match_group(identifier) {
            Some(group) => {
                log::debug!("{}: task group '{}'", identifier, group.name);
                group.base_markers.clone()
            }
            None => {
                log::warn!(
                    "Unknown task group for {} -> defaulting to {:?}",
                    identifier,
                    self.default_base_markers
                );
                self.default_base_markers.clone()
            }
        };
        markers.sort_unstable();
        markers.dedup();
        markers
    }
}

/// Configuration for movement-based trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Number of frames in the trailing rolling window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Rolling mean displacement (coordinate units per frame) above which a
    /// frame still counts as moving
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,

    /// Capture rate; informational, not used by the computation
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
}

fn default_window_size() -> usize {
    60
}

fn default_movement_threshold() -> f64 {
    3.0
}

fn default_sample_rate_hz() -> u32 {
    200
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            movement_threshold: default_movement_threshold(),
            sample_rate_hz: default_sample_rate_hz(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub io: IoConfig,

    #[serde(default)]
    pub partition: PartitionConfig,

    #[serde(default)]
    pub trim: TrimConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
