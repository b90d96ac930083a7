//! Download, refresh, and backup rotation for the case datasets.
//!
//! A headerless manifest CSV (`dataset_label,url` per row) names every
//! dataset. Files live at `<dataset_dir>/covid_<label>.csv` and are
//! re-downloaded once they are older than the configured maximum age.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::datasets::cases::CaseTable;
use crate::error::PipelineError;
use crate::fetch::{HttpClient, fetch_text};

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub dataset_label: String,
    pub url: String,
}

pub struct DatasetManager {
    dataset_dir: PathBuf,
    manifest_path: PathBuf,
    max_age: Duration,
}

impl DatasetManager {
    pub fn new(
        dataset_dir: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        max_age_secs: i64,
    ) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
            manifest_path: manifest_path.into(),
            max_age: Duration::seconds(max_age_secs),
        }
    }

    pub fn file_path(&self, label: &str) -> PathBuf {
        self.dataset_dir.join(format!("covid_{label}.csv"))
    }

    /// Reads the manifest. A missing or unparseable manifest voids the
    /// whole run, so it surfaces as `DataUnavailable`.
    pub fn read_manifest(&self) -> Result<Vec<ManifestEntry>> {
        let file = fs::File::open(&self.manifest_path).map_err(|e| {
            PipelineError::data_unavailable(format!(
                "dataset manifest {}: {e}",
                self.manifest_path.display()
            ))
        })?;

        let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_reader(file);
        let mut entries = Vec::new();
        for result in rdr.deserialize() {
            let entry: ManifestEntry = result.map_err(|e| {
                PipelineError::data_unavailable(format!(
                    "dataset manifest {}: {e}",
                    self.manifest_path.display()
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Returns `true` when any manifest dataset is missing on disk or has
    /// outlived the maximum age.
    pub fn needs_refresh(&self) -> Result<bool> {
        for entry in self.read_manifest()? {
            let path = self.file_path(&entry.dataset_label);
            let Ok(meta) = fs::metadata(&path) else {
                debug!(label = %entry.dataset_label, "Dataset file missing");
                return Ok(true);
            };

            let modified: DateTime<Utc> = meta.modified()?.into();
            if Utc::now() - modified > self.max_age {
                debug!(label = %entry.dataset_label, "Dataset file stale");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Downloads every manifest dataset, rotating any existing file to a
    /// single `.bak` sibling before overwriting it.
    pub async fn download<C: HttpClient>(&self, client: &C) -> Result<()> {
        for entry in self.read_manifest()? {
            let body = fetch_text(client, &entry.url).await?;
            let path = self.file_path(&entry.dataset_label);
            write_dataset(&path, &body)?;
            info!(label = %entry.dataset_label, path = %path.display(), "Dataset downloaded");
        }
        Ok(())
    }

    /// Cache-first: downloads only when a refresh is needed or forced.
    pub async fn ensure<C: HttpClient>(&self, client: &C, force: bool) -> Result<()> {
        if force || self.needs_refresh()? {
            self.download(client).await
        } else {
            debug!("Datasets are fresh, skipping download");
            Ok(())
        }
    }

    pub fn load(&self, label: &str) -> Result<CaseTable> {
        CaseTable::from_path(&self.file_path(label))
    }
}

/// Normalizes line endings and writes the dataset, keeping the previous
/// version as the single `.bak` backup.
fn write_dataset(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    rotate_backup(path)?;
    fs::write(path, body.replace('\r', ""))?;
    Ok(())
}

fn rotate_backup(path: &Path) -> Result<()> {
    if path.exists() {
        let backup = path.with_extension("csv.bak");
        fs::rename(path, backup)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path, max_age_secs: i64) -> DatasetManager {
        DatasetManager::new(dir, dir.join("dataset_urls.csv"), max_age_secs)
    }

    fn write_manifest(dir: &Path) {
        fs::write(
            dir.join("dataset_urls.csv"),
            "confirmed,http://example.com/confirmed.csv\n",
        )
        .unwrap();
    }

    #[test]
    fn test_missing_manifest_is_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager(dir.path(), 86400).read_manifest().unwrap_err();

        let pipeline = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(pipeline, PipelineError::DataUnavailable { .. }));
    }

    #[test]
    fn test_manifest_rows_are_label_url_pairs() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path());

        let entries = manager(dir.path(), 86400).read_manifest().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dataset_label, "confirmed");
        assert_eq!(entries[0].url, "http://example.com/confirmed.csv");
    }

    #[test]
    fn test_refresh_needed_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path());

        assert!(manager(dir.path(), 86400).needs_refresh().unwrap());
    }

    #[test]
    fn test_fresh_file_needs_no_refresh() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path());
        let m = manager(dir.path(), 86400);
        fs::write(m.file_path("confirmed"), "Country/Region,Lat,Long\n").unwrap();

        assert!(!m.needs_refresh().unwrap());
    }

    #[test]
    fn test_zero_max_age_always_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path());
        let m = manager(dir.path(), 0);
        fs::write(m.file_path("confirmed"), "Country/Region,Lat,Long\n").unwrap();

        assert!(m.needs_refresh().unwrap());
    }

    #[test]
    fn test_backup_rotation_keeps_one_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covid_confirmed.csv");

        write_dataset(&path, "first\r\nversion\r\n").unwrap();
        write_dataset(&path, "second\n").unwrap();
        write_dataset(&path, "third\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "third\n");
        let backup = path.with_extension("csv.bak");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "second\n");

        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".bak")
            })
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_carriage_returns_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covid_confirmed.csv");

        write_dataset(&path, "a,b\r\n1,2\r\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
    }
}
