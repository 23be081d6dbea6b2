//! Snapshot file discovery
//!
//! Descriptor snapshot files are named `YYYY-MM-DD-HH-MM-SS-<suffix>`, e.g.
//! `2024-05-01-12-00-00-server-descriptors`. The leading timestamp is the time
//! the snapshot was taken.

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;

/// Extract the snapshot timestamp from a file name
pub fn snapshot_time<P: AsRef<Path>>(path: P) -> Option<NaiveDateTime> {
    let name = path.as_ref().file_name()?.to_str()?;
    let stamp = name.get(..TIMESTAMP_LEN)?;
    if name[TIMESTAMP_LEN..].chars().next() != Some('-') {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// List snapshot files directly inside `dir`, sorted by name
pub fn discover_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|e| anyhow!("Failed to read snapshot directory {:?}: {}", dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && snapshot_time(path).is_some())
        .collect();
    files.sort();

    debug!("found {} snapshot files in {:?}", files.len(), dir);
    Ok(files)
}

/// Expand command-line inputs: directories become their snapshot files,
/// anything else (files, URLs) is passed through
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(discover_files(input)?);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_snapshot_time() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        assert_eq!(
            snapshot_time("/data/2024-05-01-12-30-05-server-descriptors"),
            Some(expected)
        );

        assert_eq!(snapshot_time("2024-05-01-12-30-05"), None);
        assert_eq!(snapshot_time("2024-05-01-12-30-05.txt"), None);
        assert_eq!(snapshot_time("2024-13-01-12-30-05-descriptors"), None);
        assert_eq!(snapshot_time("server-descriptors"), None);
    }

    #[test]
    fn test_discover_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in [
            "2024-05-01-01-00-00-server-descriptors",
            "2024-05-01-00-00-00-server-descriptors",
            "notes.txt",
        ] {
            fs::write(temp_dir.path().join(name), "").unwrap();
        }
        fs::create_dir(temp_dir.path().join("2024-05-01-02-00-00-dir")).unwrap();

        let files = discover_files(temp_dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                "2024-05-01-00-00-00-server-descriptors",
                "2024-05-01-01-00-00-server-descriptors"
            ]
        );

        let expanded = expand_inputs(&[
            temp_dir.path().to_path_buf(),
            PathBuf::from("extra-file"),
        ])
        .unwrap();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[2], PathBuf::from("extra-file"));

        assert!(discover_files(temp_dir.path().join("nope")).is_err());
    }
}
