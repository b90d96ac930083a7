//! Border-closure dataset: a `:`-delimited CSV of closures turned into the
//! JSON document the spread models consume.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PipelineError;

/// Closures for EU countries with no explicit row default to this date,
/// when most member states closed their external borders.
const DEFAULT_EU_CLOSURE_DATE: &str = "3/17/20";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub date: String,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

/// Closures keyed per country and per `state:country` pair.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderClosures {
    pub country: BTreeMap<String, Vec<Closure>>,
    pub state: BTreeMap<String, Vec<Closure>>,
}

/// One row of the closures CSV. The file is `:`-delimited because the
/// whitelist and blacklist columns use commas-free `|`-separated lists.
#[derive(Debug, Deserialize)]
struct ClosureRow {
    #[serde(rename = "Province/State")]
    state: Option<String>,
    #[serde(rename = "Country/Region")]
    country: String,
    #[serde(rename = "ClosureDate")]
    date: String,
    #[serde(rename = "WhiteList")]
    whitelist: Option<String>,
    #[serde(rename = "BlackList")]
    blacklist: Option<String>,
}

/// Loads the list of EU member countries (CSV with a `Country` column).
pub fn load_eu_countries(path: &Path) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct Row {
        #[serde(rename = "Country")]
        country: String,
    }

    let file = File::open(path).map_err(|e| {
        PipelineError::data_unavailable(format!("EU countries {}: {e}", path.display()))
    })?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut countries = Vec::new();
    for result in rdr.deserialize() {
        let row: Row = result?;
        countries.push(row.country);
    }
    Ok(countries)
}

/// Builds the closure document from the closures CSV.
///
/// Every EU country without an explicit country-level row receives a
/// default closure whitelisting the EU, except Ireland, which kept its
/// common travel area open.
pub fn build(closures_csv: &Path, eu_countries: &[String]) -> Result<BorderClosures> {
    let file = File::open(closures_csv).map_err(|e| {
        PipelineError::data_unavailable(format!("closures {}: {e}", closures_csv.display()))
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b':')
        .from_reader(file);

    let mut closures = BorderClosures::default();

    for result in rdr.deserialize() {
        let row: ClosureRow = result?;
        let closure = Closure {
            date: row.date,
            whitelist: parse_border_list(row.whitelist.as_deref(), eu_countries),
            blacklist: parse_border_list(row.blacklist.as_deref(), eu_countries),
        };

        match row.state.filter(|s| !s.is_empty() && s != "none") {
            None => closures
                .country
                .entry(row.country)
                .or_default()
                .push(closure),
            Some(state) => closures
                .state
                .entry(format!("{state}:{}", row.country))
                .or_default()
                .push(closure),
        }
    }

    for eu_country in eu_countries {
        if eu_country == "Ireland" || closures.country.contains_key(eu_country) {
            continue;
        }
        closures.country.insert(
            eu_country.clone(),
            vec![Closure {
                date: DEFAULT_EU_CLOSURE_DATE.to_string(),
                whitelist: eu_countries.to_vec(),
                blacklist: Vec::new(),
            }],
        );
    }

    Ok(closures)
}

/// Splits a `|`-separated list, expanding the `EU` token to the member
/// country list. `none` or an empty field means an empty list.
fn parse_border_list(list: Option<&str>, eu_countries: &[String]) -> Vec<String> {
    match list {
        None | Some("") | Some("none") => Vec::new(),
        Some(list) => list
            .split('|')
            .flat_map(|item| {
                if item == "EU" {
                    eu_countries.to_vec()
                } else {
                    vec![item.to_string()]
                }
            })
            .collect(),
    }
}

pub fn write_json(path: &Path, closures: &BorderClosures) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(file, closures)?;
    info!(path = %path.display(), "Border-closure dataset written");
    Ok(())
}

pub fn load_json(path: &Path) -> Result<BorderClosures> {
    let file = File::open(path).map_err(|e| {
        PipelineError::data_unavailable(format!("border closures {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_reader(file)?)
}
