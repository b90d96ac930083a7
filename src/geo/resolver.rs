//! Assignment of airports to their nearest administrative region.
//!
//! Candidate regions for an airport are those whose country matches the
//! airport's country name, falling back to a state-name match for
//! territories the case data lists as provinces. The winner is the
//! candidate whose centroid minimizes integer-km haversine distance, with
//! ties broken by lexicographic region key.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::geo::haversine::distance_km;
use crate::model::{Airport, AirportLocation, Region, RegionKey};
use crate::output::write_records;

/// Collapses per-row observations into one [`Region`] per key, with the
/// centroid as the mean latitude and longitude over the key's rows.
pub fn region_centroids<I>(observations: I) -> Vec<Region>
where
    I: IntoIterator<Item = (RegionKey, f64, f64)>,
{
    let mut sums: BTreeMap<RegionKey, (f64, f64, u32)> = BTreeMap::new();

    for (key, lat, long) in observations {
        let entry = sums.entry(key).or_insert((0.0, 0.0, 0));
        entry.0 += lat;
        entry.1 += long;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(key, (lat_sum, long_sum, n))| Region {
            key,
            latitude: lat_sum / n as f64,
            longitude: long_sum / n as f64,
        })
        .collect()
}

/// Assigns each airport to the region whose centroid is nearest to it.
///
/// Airports with no candidate region (no country match, no state-name
/// fallback) produce no output row. Absence from the table means "no
/// distance-resolvable region", never an error.
pub fn resolve(airports: &[Airport], regions: &[Region]) -> Vec<AirportLocation> {
    let mut table = Vec::new();
    let mut dropped = 0usize;

    for airport in airports {
        let Some(nearest) = nearest_region(airport, regions) else {
            debug!(
                iata = %airport.iata,
                country = %airport.country,
                "No candidate region for airport, dropping"
            );
            dropped += 1;
            continue;
        };

        table.push(AirportLocation {
            iata_code: airport.iata.clone(),
            county: nearest.key.county.clone(),
            state: nearest.key.state.clone(),
            country: nearest.key.country.clone(),
            airport_lat: airport.latitude,
            airport_long: airport.longitude,
        });
    }

    info!(
        resolved = table.len(),
        dropped, "Airport-to-region resolution complete"
    );
    table
}

fn nearest_region<'a>(airport: &Airport, regions: &'a [Region]) -> Option<&'a Region> {
    let by_country: Vec<&Region> = regions
        .iter()
        .filter(|r| r.key.country == airport.country)
        .collect();

    // Some territories appear in the case data as a province of another
    // country rather than a country of their own.
    let candidates = if by_country.is_empty() {
        regions
            .iter()
            .filter(|r| r.key.state.as_deref() == Some(airport.country.as_str()))
            .collect()
    } else {
        by_country
    };

    candidates.into_iter().min_by_key(|r| {
        (
            distance_km(
                (airport.latitude, airport.longitude),
                (r.latitude, r.longitude),
            ),
            r.key.clone(),
        )
    })
}

/// Loads the airport metadata source (a JSON array of airport records).
pub fn load_airports(path: &Path) -> Result<Vec<Airport>> {
    let file = File::open(path).map_err(|e| {
        PipelineError::data_unavailable(format!("airport dataset {}: {e}", path.display()))
    })?;
    let airports: Vec<Airport> = serde_json::from_reader(file).map_err(|e| {
        PipelineError::data_unavailable(format!("airport dataset {}: {e}", path.display()))
    })?;
    Ok(airports)
}

/// Loads a previously persisted airport-location table.
pub fn load_location_table(path: &Path) -> Result<Vec<AirportLocation>> {
    let file = File::open(path).map_err(|e| {
        PipelineError::data_unavailable(format!("location table {}: {e}", path.display()))
    })?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut table = Vec::new();
    for result in rdr.deserialize() {
        let row: AirportLocation = result?;
        table.push(row);
    }
    Ok(table)
}

/// Cache-first entry point: loads the persisted table when present,
/// otherwise resolves from scratch and persists the result.
///
/// `force_rebuild` discards any cached table. If the airport source is
/// unreadable while a cached table exists, the cache is used and the
/// failure is reported as a warning.
pub fn load_or_resolve(
    cache_path: &Path,
    airports_path: &Path,
    regions: &[Region],
    force_rebuild: bool,
) -> Result<Vec<AirportLocation>> {
    let cached = cache_path.exists();

    if cached && !force_rebuild {
        debug!(path = %cache_path.display(), "Using cached airport-location table");
        return load_location_table(cache_path);
    }

    let airports = match load_airports(airports_path) {
        Ok(airports) => airports,
        Err(e) if cached => {
            warn!(error = %e, "Rebuild infeasible, falling back to cached table");
            return load_location_table(cache_path);
        }
        Err(e) => return Err(e),
    };

    let table = resolve(&airports, regions);
    write_records(cache_path, &table)?;
    info!(path = %cache_path.display(), rows = table.len(), "Airport-location table persisted");

    Ok(table)
}
