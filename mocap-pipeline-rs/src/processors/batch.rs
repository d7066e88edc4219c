//! Per-file batch execution.
//!
//! Each file is an independent unit of work. Files are processed in
//! parallel and every file yields a [`FileOutcome`]; a failing file is
//! recorded and the batch carries on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that stop a batch before any file is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("No CSV files found in {folder}")]
    NoFilesFound { folder: PathBuf },
}

/// Why a single file was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Bytes are not valid in the configured encoding.
    Decode,
    /// No marker header block was found.
    HeaderNotFound,
    /// Column counts or header structure are inconsistent.
    SchemaMismatch,
    /// Reading or writing the file failed.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Decode => "DecodeError",
            FailureKind::HeaderNotFound => "HeaderNotFound",
            FailureKind::SchemaMismatch => "SchemaMismatch",
            FailureKind::Io => "IoError",
        };
        f.write_str(name)
    }
}

/// A classified per-file failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FileFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Work item for parallel batch processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of processing one file.
#[derive(Debug, Clone)]
pub struct FileOutcome<T> {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: std::result::Result<T, FileFailure>,
}

/// Outcomes of a whole batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub outcomes: Vec<FileOutcome<T>>,
}

impl<T> BatchReport<T> {
    /// Outcomes that produced an output file.
    pub fn succeeded(&self) -> impl Iterator<Item = (&FileOutcome<T>, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|value| (o, value)))
    }

    /// Outcomes that were skipped.
    pub fn failed(&self) -> impl Iterator<Item = (&FileOutcome<T>, &FileFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|failure| (o, failure)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// Number of failures per kind.
    pub fn failures_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for (_, failure) in self.failed() {
            *counts.entry(failure.kind).or_insert(0) += 1;
        }
        counts
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Recursively collect CSV files below `root`, sorted by path.
///
/// Unreadable directory entries are logged and skipped.
pub fn find_csv_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(BatchError::DirectoryNotFound(root.to_path_buf()).into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_csv_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Output path for `file`, mirroring its location below `input_root`.
///
/// A `suffix` is appended to the file stem, keeping the extension:
/// `a/b.csv` with suffix `_trimmed` becomes `a/b_trimmed.csv`.
pub fn mirror_output_path(
    input_root: &Path,
    output_root: &Path,
    file: &Path,
    suffix: Option<&str>,
) -> PathBuf {
    let relative = file
        .strip_prefix(input_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file.file_name().map(PathBuf::from).unwrap_or_default());

    let mut output = output_root.join(relative);

    if let Some(suffix) = suffix {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match output.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, suffix),
        };
        output.set_file_name(name);
    }

    output
}

/// Build one task per CSV file below `input_root`.
///
/// # Arguments
///
/// * `input_root` - Directory to search recursively
/// * `output_root` - Directory receiving the mirrored outputs
/// * `suffix` - Optional stem suffix for output files
/// * `limit` - Maximum number of files (None for all)
pub fn plan_tasks(
    input_root: &Path,
    output_root: &Path,
    suffix: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<BatchTask>> {
    let files = find_csv_files(input_root)?;

    if files.is_empty() {
        return Err(BatchError::NoFilesFound {
            folder: input_root.to_path_buf(),
        }
        .into());
    }

    Ok(files
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|input| {
            let output = mirror_output_path(input_root, output_root, &input, suffix);
            BatchTask { input, output }
        })
        .collect())
}

/// Run `op` over every task in parallel.
///
/// Outcomes keep task order. Successes and failures are logged per file.
pub fn run_batch<T, F>(tasks: &[BatchTask], op: F) -> BatchReport<T>
where
    T: Send,
    F: Fn(&Path, &Path) -> std::result::Result<T, FileFailure> + Sync,
{
    let outcomes = tasks
        .par_iter()
        .map(|task| {
            let result = op(&task.input, &task.output);
            match &result {
                Ok(_) => log::info!("{} -> {}", task.input.display(), task.output.display()),
                Err(failure) => log::error!("Skipping {}: {}", task.input.display(), failure),
            }
            FileOutcome {
                input: task.input.clone(),
                output: task.output.clone(),
                result,
            }
        })
        .collect();

    BatchReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn test_find_csv_files_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b").join("trial_2.csv"));
        touch(&root.join("a").join("trial_1.CSV"));
        touch(&root.join("a").join("notes.txt"));
        touch(&root.join("c.csv"));

        let files = find_csv_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a/trial_1.CSV"),
                PathBuf::from("b/trial_2.csv"),
                PathBuf::from("c.csv"),
            ]
        );
    }

    #[test]
    fn test_find_csv_files_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_csv_files(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_mirror_output_path() {
        let out = mirror_output_path(
            Path::new("in"),
            Path::new("out"),
            Path::new("in/Gewicht/p1.csv"),
            None,
        );
        assert_eq!(out, PathBuf::from("out/Gewicht/p1.csv"));

        let trimmed = mirror_output_path(
            Path::new("in"),
            Path::new("out"),
            Path::new("in/Kreis/p1.csv"),
            Some("_trimmed"),
        );
        assert_eq!(trimmed, PathBuf::from("out/Kreis/p1_trimmed.csv"));
    }

    #[test]
    fn test_mirror_output_path_outside_root() {
        let out = mirror_output_path(
            Path::new("in"),
            Path::new("out"),
            Path::new("elsewhere/p1.csv"),
            None,
        );
        assert_eq!(out, PathBuf::from("out/p1.csv"));
    }

    #[test]
    fn test_plan_tasks_with_limit() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        touch(&input.join("1.csv"));
        touch(&input.join("2.csv"));
        touch(&input.join("3.csv"));

        let tasks = plan_tasks(&input, &temp_dir.path().join("out"), None, Some(2)).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].output, temp_dir.path().join("out").join("1.csv"));
    }

    #[test]
    fn test_plan_tasks_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let result = plan_tasks(temp_dir.path(), &temp_dir.path().join("out"), None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_batch_isolates_failures() {
        let tasks: Vec<BatchTask> = ["ok_1.csv", "bad.csv", "ok_2.csv"]
            .iter()
            .map(|name| BatchTask {
                input: PathBuf::from(name),
                output: PathBuf::from("out").join(name),
            })
            .collect();

        let report = run_batch(&tasks, |input, _output| {
            if input.to_string_lossy().starts_with("bad") {
                Err(FileFailure::new(FailureKind::HeaderNotFound, "no header"))
            } else {
                Ok(input.to_string_lossy().len())
            }
        });

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.outcomes[1].input, PathBuf::from("bad.csv"));
        assert_eq!(
            report.failures_by_kind().get(&FailureKind::HeaderNotFound),
            Some(&1)
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = FileFailure::new(FailureKind::SchemaMismatch, "duplicate column 1_X");
        assert_eq!(failure.to_string(), "[SchemaMismatch] duplicate column 1_X");
    }
}
