//! CSV persistence helpers shared by the pipeline stages.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Writes a full set of records to a CSV file, replacing any existing
/// content. Headers are always written.
pub fn write_records<S: Serialize>(path: &Path, records: &[S]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = records.len(), "CSV written");
    Ok(())
}

/// Reads every row of a CSV file into records.
pub fn read_records<D: DeserializeOwned>(path: &Path) -> Result<Vec<D>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Appends a single record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<S: Serialize>(path: &Path, record: &S) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}
