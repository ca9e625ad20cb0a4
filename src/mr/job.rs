use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// An immutable description of a MapReduce run: how many map and reduce
/// tasks to create, and which file to read.
///
/// Created once by the submitter and delivered to the master through
/// `Master.SubmitJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub n_map: i32,
    pub n_reduce: i32,
    pub input_path: String,
}

impl Job {
    /// Validates `n_map >= 1`, `n_reduce >= 1` and that `input_path` names a
    /// readable regular file before handing back a `Job`.
    pub fn new(n_map: i32, n_reduce: i32, input_path: impl Into<String>) -> anyhow::Result<Self> {
        let input_path = input_path.into();
        if n_map < 1 {
            bail!("n_map must be >= 1, got {}", n_map);
        }
        if n_reduce < 1 {
            bail!("n_reduce must be >= 1, got {}", n_reduce);
        }
        let meta = std::fs::metadata(&input_path)
            .with_context(|| format!("cannot stat input file {}", input_path))?;
        if !meta.is_file() {
            bail!("input path {} is not a regular file", input_path);
        }
        Ok(Self {
            n_map,
            n_reduce,
            input_path,
        })
    }

    pub fn input_dir(&self) -> &Path {
        Path::new(&self.input_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn input_file_name(&self) -> &str {
        Path::new(&self.input_path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_map_tasks() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = Job::new(0, 1, tmp.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("n_map"));
    }

    #[test]
    fn rejects_missing_input() {
        let err = Job::new(1, 1, "/no/such/path-xyz").unwrap_err();
        assert!(err.to_string().contains("cannot stat"));
    }

    #[test]
    fn accepts_valid_job() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let job = Job::new(2, 3, tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(job.n_map, 2);
        assert_eq!(job.n_reduce, 3);
    }
}
