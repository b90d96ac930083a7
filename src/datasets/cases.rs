//! Parsing and binning of the epidemiological case tables.
//!
//! The tables are JHU-style CSVs: region columns (`County` optional,
//! `Province/State` optional, `Country/Region`, `Lat`, `Long`) followed by
//! one cumulative-count column per date.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Result, bail};

use crate::error::PipelineError;
use crate::model::{Granularity, RegionKey};

#[derive(Debug, Clone, PartialEq)]
pub struct CaseRow {
    pub key: RegionKey,
    pub latitude: f64,
    pub longitude: f64,
    /// Counts aligned with the owning table's `dates`.
    pub counts: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseTable {
    pub dates: Vec<String>,
    pub rows: Vec<CaseRow>,
}

/// Which date columns a binning query keeps.
#[derive(Debug, Clone)]
pub enum DateSelection {
    All,
    /// The last recorded date column.
    Latest,
    /// One specific date column; an unknown date is an error.
    On(String),
}

impl CaseTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            PipelineError::data_unavailable(format!("case table {}: {e}", path.display()))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h == name);

        let county_idx = find("County");
        let state_idx = find("Province/State");
        let country_idx = find("Country/Region")
            .ok_or_else(|| PipelineError::data_unavailable("case table has no Country/Region"))?;
        let long_idx = find("Long")
            .ok_or_else(|| PipelineError::data_unavailable("case table has no Long column"))?;
        let lat_idx = find("Lat")
            .ok_or_else(|| PipelineError::data_unavailable("case table has no Lat column"))?;

        // Everything after Long is a date column.
        let dates: Vec<String> = headers
            .iter()
            .skip(long_idx + 1)
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let optional = |idx: Option<usize>| {
                idx.map(field)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };

            rows.push(CaseRow {
                key: RegionKey::new(
                    optional(county_idx),
                    optional(state_idx),
                    field(country_idx).to_string(),
                ),
                latitude: field(lat_idx).parse().unwrap_or(0.0),
                longitude: field(long_idx).parse().unwrap_or(0.0),
                // Missing observations read as zero.
                counts: (long_idx + 1..headers.len())
                    .map(|i| field(i).parse().unwrap_or(0.0))
                    .collect(),
            });
        }

        Ok(Self { dates, rows })
    }

    /// Per-row (region key, latitude, longitude) observations, the input
    /// for region centroid construction.
    pub fn observations(&self) -> impl Iterator<Item = (RegionKey, f64, f64)> + '_ {
        self.rows
            .iter()
            .map(|r| (r.key.clone(), r.latitude, r.longitude))
    }

    /// Bins case counts at the requested granularity.
    ///
    /// State and country bins average coordinates and sum counts over their
    /// member rows. County granularity passes rows through unbinned, since
    /// the source data's finest granularity already is per-county.
    pub fn bin_cases(
        &self,
        granularity: Granularity,
        country: Option<&str>,
        date: &DateSelection,
    ) -> Result<CaseTable> {
        let date_indices: Vec<usize> = match date {
            DateSelection::All => (0..self.dates.len()).collect(),
            DateSelection::Latest => {
                if self.dates.is_empty() {
                    bail!("case table has no date columns");
                }
                vec![self.dates.len() - 1]
            }
            DateSelection::On(wanted) => match self.dates.iter().position(|d| d == wanted) {
                Some(idx) => vec![idx],
                None => bail!(
                    "{wanted} is not a valid date, check the case tables for what valid dates look like"
                ),
            },
        };
        let dates: Vec<String> = date_indices
            .iter()
            .map(|&i| self.dates[i].clone())
            .collect();

        let selected = self
            .rows
            .iter()
            .filter(|row| country.is_none_or(|c| row.key.country == c));

        if granularity == Granularity::County {
            let rows = selected
                .map(|row| CaseRow {
                    key: row.key.clone(),
                    latitude: row.latitude,
                    longitude: row.longitude,
                    counts: date_indices.iter().map(|&i| row.counts[i]).collect(),
                })
                .collect();
            return Ok(CaseTable { dates, rows });
        }

        let mut groups: BTreeMap<RegionKey, (f64, f64, u32, Vec<f64>)> = BTreeMap::new();
        for row in selected {
            let entry = groups
                .entry(granularity.project(&row.key))
                .or_insert_with(|| (0.0, 0.0, 0, vec![0.0; date_indices.len()]));
            entry.0 += row.latitude;
            entry.1 += row.longitude;
            entry.2 += 1;
            for (slot, &i) in entry.3.iter_mut().zip(&date_indices) {
                *slot += row.counts[i];
            }
        }

        let rows = groups
            .into_iter()
            .map(|(key, (lat_sum, long_sum, n, counts))| CaseRow {
                key,
                latitude: lat_sum / n as f64,
                longitude: long_sum / n as f64,
                counts,
            })
            .collect();

        Ok(CaseTable { dates, rows })
    }
}
