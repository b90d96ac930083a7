//! Data types shared across the pipeline: regions, airports, the derived
//! airport-location table, raw route records, and aggregated edges.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Identity of an administrative region. County and state are optional;
/// country is mandatory.
///
/// The derived `Ord` (county, then state, then country, `None` sorting
/// first) is the deterministic tie-break used when two region centroids
/// are equidistant from an airport.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionKey {
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: String,
}

impl RegionKey {
    pub fn new(county: Option<String>, state: Option<String>, country: impl Into<String>) -> Self {
        Self {
            county,
            state,
            country: country.into(),
        }
    }

    /// Shorthand for a country-level key.
    pub fn country(country: impl Into<String>) -> Self {
        Self::new(None, None, country)
    }
}

/// A region with its aggregate centroid, computed as the mean latitude and
/// longitude over all source observations sharing the key.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub key: RegionKey,
    pub latitude: f64,
    pub longitude: f64,
}

/// A single airport from the airport metadata source. Field names follow
/// the aviation-edge airport database JSON. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Airport {
    #[serde(rename = "codeIataAirport")]
    pub iata: String,
    #[serde(rename = "codeIcaoAirport")]
    pub icao: Option<String>,
    #[serde(rename = "nameCountry")]
    pub country: String,
    #[serde(rename = "latitudeAirport")]
    pub latitude: f64,
    #[serde(rename = "longitudeAirport")]
    pub longitude: f64,
}

/// One row of the persisted airport-location table: an airport and the
/// region whose centroid is nearest to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportLocation {
    pub iata_code: String,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: String,
    pub airport_lat: f64,
    pub airport_long: f64,
}

impl AirportLocation {
    pub fn region_key(&self) -> RegionKey {
        RegionKey::new(
            self.county.clone(),
            self.state.clone(),
            self.country.clone(),
        )
    }
}

/// One resolved directed route between two airports, annotated with each
/// side's region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub depart_iata: String,
    pub depart_county: Option<String>,
    pub depart_state: Option<String>,
    pub depart_country: String,
    pub arrival_iata: String,
    pub arrival_county: Option<String>,
    pub arrival_state: Option<String>,
    pub arrival_country: String,
}

impl RouteRecord {
    pub fn new(depart: &AirportLocation, arrival: &AirportLocation) -> Self {
        Self {
            depart_iata: depart.iata_code.clone(),
            depart_county: depart.county.clone(),
            depart_state: depart.state.clone(),
            depart_country: depart.country.clone(),
            arrival_iata: arrival.iata_code.clone(),
            arrival_county: arrival.county.clone(),
            arrival_state: arrival.state.clone(),
            arrival_country: arrival.country.clone(),
        }
    }

    pub fn depart_key(&self) -> RegionKey {
        RegionKey::new(
            self.depart_county.clone(),
            self.depart_state.clone(),
            self.depart_country.clone(),
        )
    }

    pub fn arrival_key(&self) -> RegionKey {
        RegionKey::new(
            self.arrival_county.clone(),
            self.arrival_state.clone(),
            self.arrival_country.clone(),
        )
    }
}

/// An aggregated count of routes between two regions, projected to the
/// granularity chosen at aggregation time. Produced fresh on every query
/// and never persisted back into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedEdge {
    pub depart_county: Option<String>,
    pub depart_state: Option<String>,
    pub depart_country: String,
    pub arrival_county: Option<String>,
    pub arrival_state: Option<String>,
    pub arrival_country: String,
    pub number_of_routes: u64,
}

impl WeightedEdge {
    pub fn new(origin: RegionKey, destination: RegionKey, number_of_routes: u64) -> Self {
        Self {
            depart_county: origin.county,
            depart_state: origin.state,
            depart_country: origin.country,
            arrival_county: destination.county,
            arrival_state: destination.state,
            arrival_country: destination.country,
            number_of_routes,
        }
    }
}

/// Region specificity used when binning cases or aggregating routes.
/// County is the finest level; each level is a strict coarsening of the
/// previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    County,
    State,
    Country,
}

impl Granularity {
    /// Projects a full region key down to this granularity.
    pub fn project(&self, key: &RegionKey) -> RegionKey {
        match self {
            Granularity::County => key.clone(),
            Granularity::State => RegionKey::new(None, key.state.clone(), key.country.clone()),
            Granularity::Country => RegionKey::country(key.country.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_key_ordering_is_lexicographic() {
        let a = RegionKey::new(None, None, "Albania".to_string());
        let b = RegionKey::new(None, Some("Ontario".to_string()), "Canada".to_string());
        let c = RegionKey::new(Some("Cook".to_string()), None, "US".to_string());

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_project_coarsens_key() {
        let key = RegionKey::new(
            Some("Cook".to_string()),
            Some("Illinois".to_string()),
            "US".to_string(),
        );

        let state = Granularity::State.project(&key);
        assert_eq!(state.county, None);
        assert_eq!(state.state.as_deref(), Some("Illinois"));
        assert_eq!(state.country, "US");

        let country = Granularity::Country.project(&key);
        assert_eq!(country, RegionKey::country("US".to_string()));
    }
}
