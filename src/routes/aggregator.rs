//! Collapses raw route records into weighted edges between regions.

use std::collections::BTreeMap;

use crate::model::{Granularity, RegionKey, RouteRecord, WeightedEdge};

/// Groups route records into weighted region-to-region edges at the chosen
/// granularity.
///
/// Pure and order-independent: grouping accumulates counts in an ordered
/// map keyed by the projected (origin, destination) pair, so aggregating
/// any permutation of the same records yields the same edges. When
/// `country_filter` is set, only records whose departure AND arrival
/// country both equal the filter survive.
///
/// At `County` granularity the projection is the identity, so distinct raw
/// records each form their own edge and exact duplicates collapse into one
/// edge carrying their multiplicity.
pub fn aggregate(
    records: &[RouteRecord],
    granularity: Granularity,
    country_filter: Option<&str>,
) -> Vec<WeightedEdge> {
    let mut counts: BTreeMap<(RegionKey, RegionKey), u64> = BTreeMap::new();

    for record in records {
        if let Some(country) = country_filter {
            if record.depart_country != country || record.arrival_country != country {
                continue;
            }
        }

        let origin = granularity.project(&record.depart_key());
        let destination = granularity.project(&record.arrival_key());
        *counts.entry((origin, destination)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((origin, destination), n)| WeightedEdge::new(origin, destination, n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        depart_state: Option<&str>,
        depart_country: &str,
        arrival_state: Option<&str>,
        arrival_country: &str,
    ) -> RouteRecord {
        RouteRecord {
            depart_iata: "DDD".to_string(),
            depart_county: None,
            depart_state: depart_state.map(str::to_string),
            depart_country: depart_country.to_string(),
            arrival_iata: "AAA".to_string(),
            arrival_county: None,
            arrival_state: arrival_state.map(str::to_string),
            arrival_country: arrival_country.to_string(),
        }
    }

    #[test]
    fn test_country_grouping_counts_all_records() {
        let records = vec![
            record(Some("North"), "Testland", Some("South"), "Testland"),
            record(Some("South"), "Testland", Some("North"), "Testland"),
            record(None, "Testland", None, "Otherland"),
        ];

        let edges = aggregate(&records, Granularity::Country, None);

        let total: u64 = edges.iter().map(|e| e.number_of_routes).sum();
        assert_eq!(total, records.len() as u64);

        // Both intra-Testland records land on the same country-level edge.
        assert_eq!(edges.len(), 2);
        let intra = edges
            .iter()
            .find(|e| e.arrival_country == "Testland")
            .unwrap();
        assert_eq!(intra.number_of_routes, 2);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let records = vec![
            record(Some("North"), "Testland", Some("South"), "Testland"),
            record(None, "Otherland", None, "Testland"),
            record(Some("North"), "Testland", Some("South"), "Testland"),
            record(None, "Testland", None, "Otherland"),
        ];

        let forward = aggregate(&records, Granularity::State, None);
        let reversed: Vec<_> = records.iter().rev().cloned().collect();
        let backward = aggregate(&reversed, Granularity::State, None);

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_country_filter_requires_both_endpoints() {
        let records = vec![
            record(None, "Testland", None, "Testland"),
            record(None, "Testland", None, "Otherland"),
            record(None, "Otherland", None, "Testland"),
        ];

        let edges = aggregate(&records, Granularity::Country, Some("Testland"));

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].depart_country, "Testland");
        assert_eq!(edges[0].arrival_country, "Testland");
        assert_eq!(edges[0].number_of_routes, 1);
    }

    #[test]
    fn test_state_grouping_drops_county() {
        let mut with_county = record(Some("North"), "Testland", Some("South"), "Testland");
        with_county.depart_county = Some("Hillside".to_string());

        let edges = aggregate(&[with_county], Granularity::State, None);

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].depart_county, None);
        assert_eq!(edges[0].depart_state.as_deref(), Some("North"));
    }

    #[test]
    fn test_county_granularity_collapses_exact_duplicates() {
        // The finest granularity performs no coarsening, so only records
        // identical in every region column share an edge.
        let records = vec![
            record(Some("North"), "Testland", Some("South"), "Testland"),
            record(Some("North"), "Testland", Some("South"), "Testland"),
            record(Some("South"), "Testland", Some("North"), "Testland"),
        ];

        let edges = aggregate(&records, Granularity::County, None);

        assert_eq!(edges.len(), 2);
        let total: u64 = edges.iter().map(|e| e.number_of_routes).sum();
        assert_eq!(total, 3);
    }
}
