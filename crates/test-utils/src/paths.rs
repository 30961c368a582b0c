//! Temporary files holding dataset descriptions.

use std::path::{Path, PathBuf};

use mesh_common::Dataset;
use tempfile::TempDir;

/// Write `dataset` as JSON into `dir` under `name` and return the file path.
pub fn write_dataset(dir: &Path, name: &str, dataset: &Dataset) -> PathBuf {
    let path = dir.join(name);
    let json = dataset.to_json_string().expect("serialize dataset");
    std::fs::write(&path, json).expect("write dataset");
    path
}

/// A temporary directory holding `dataset` as `dataset.json`.
///
/// Keep the returned [`TempDir`] alive for as long as the file is needed.
pub fn dataset_file(dataset: &Dataset) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = write_dataset(dir.path(), "dataset.json", dataset);
    (dir, path)
}
