//! Concurrent collection of outbound routes for every known airport.
//!
//! One shared work channel of departure airports feeds `worker_count - 1`
//! fetch workers; a single aggregation task owns the result accumulator
//! and is fed over a second channel, so no lock guards the records. Both
//! channels signal shutdown by closure: a receiver only observes the end
//! of a channel after every previously sent item has been drained, so no
//! route can be lost to premature shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;
use tracing::{Instrument, debug, info, warn};

use crate::error::PipelineError;
use crate::model::{AirportLocation, RouteRecord};
use crate::services::route_api::{RawRoute, RouteApi};

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Total worker count; one is reserved for aggregation, the rest
    /// fetch. Must be at least 2.
    pub worker_count: usize,
    /// Attempts per airport before it is dead-lettered.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default)]
pub struct CollectorOutput {
    pub records: Vec<RouteRecord>,
    /// Airports whose fetch kept failing after all retry attempts.
    pub dead_letters: Vec<String>,
}

/// Builds the arrival-lookup index over a resolved airport-location table.
pub fn location_index(table: &[AirportLocation]) -> HashMap<String, AirportLocation> {
    table
        .iter()
        .map(|row| (row.iata_code.clone(), row.clone()))
        .collect()
}

/// Fetches outbound routes for every departure airport and resolves each
/// arrival against the location table.
///
/// Routes whose arrival airport has no table entry are dropped one at a
/// time; a malformed or "no data" response drops that airport's batch
/// without affecting any other airport.
pub async fn collect<A>(
    api: Arc<A>,
    departures: Vec<AirportLocation>,
    locations: Arc<HashMap<String, AirportLocation>>,
    config: CollectorConfig,
) -> Result<CollectorOutput>
where
    A: RouteApi + 'static,
{
    anyhow::ensure!(
        config.worker_count >= 2,
        "{} is not enough workers to collect the route dataset",
        config.worker_count
    );
    let fetch_workers = config.worker_count - 1;

    info!(
        airports = departures.len(),
        fetch_workers, "Starting route collection"
    );

    let (work_tx, work_rx) = mpsc::unbounded_channel::<AirportLocation>();
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(AirportLocation, Vec<RawRoute>)>();

    // Enqueue everything up front and close the sending side. Workers
    // observe the closure only once the queue is fully drained.
    for depart in departures {
        let _ = work_tx.send(depart);
    }
    drop(work_tx);

    let aggregator = tokio::spawn(
        {
            let locations = locations.clone();
            async move {
                let mut records = Vec::new();
                while let Some((depart, routes)) = done_rx.recv().await {
                    for route in routes {
                        match locations.get(&route.arrival_iata) {
                            Some(arrival) => records.push(RouteRecord::new(&depart, arrival)),
                            None => {
                                let e = PipelineError::UnresolvableLocation {
                                    iata: route.arrival_iata,
                                };
                                debug!(error = %e, "Dropping route");
                            }
                        }
                    }
                }
                records
            }
        }
        .instrument(tracing::info_span!("aggregation_worker")),
    );

    let mut workers = Vec::new();
    for worker in 0..fetch_workers {
        let api = api.clone();
        let work_rx = work_rx.clone();
        let done_tx = done_tx.clone();
        let max_attempts = config.max_attempts;
        let initial_backoff = config.initial_backoff;

        let span = tracing::info_span!("fetch_worker", worker);
        workers.push(tokio::spawn(
            async move {
                let mut dead = Vec::new();
                loop {
                    let depart = { work_rx.lock().await.recv().await };
                    let Some(depart) = depart else { break };

                    let outcome =
                        fetch_with_retry(api.as_ref(), &depart.iata_code, max_attempts, initial_backoff)
                            .await;
                    match outcome {
                        FetchOutcome::Routes(routes) => {
                            let _ = done_tx.send((depart, routes));
                        }
                        FetchOutcome::Skipped => {}
                        FetchOutcome::DeadLetter => dead.push(depart.iata_code),
                    }
                }
                dead
            }
            .instrument(span),
        ));
    }
    drop(done_tx);

    let mut dead_letters = Vec::new();
    for worker in workers {
        dead_letters.extend(worker.await?);
    }

    // All fetch senders are gone at this point; the aggregation task exits
    // once it has drained the remaining results.
    let records = aggregator.await?;

    if !dead_letters.is_empty() {
        warn!(
            count = dead_letters.len(),
            airports = ?dead_letters,
            "Some airports kept failing and were dead-lettered"
        );
    }
    info!(records = records.len(), "Route collection complete");

    Ok(CollectorOutput {
        records,
        dead_letters,
    })
}

enum FetchOutcome {
    Routes(Vec<RawRoute>),
    /// No data or an unusable response; nothing to aggregate, no retry.
    Skipped,
    DeadLetter,
}

async fn fetch_with_retry<A: RouteApi + ?Sized>(
    api: &A,
    iata: &str,
    max_attempts: u32,
    initial_backoff: Duration,
) -> FetchOutcome {
    let mut attempt = 1;
    let mut backoff = initial_backoff;

    loop {
        match api.outbound_routes(iata).await {
            Ok(Some(routes)) => return FetchOutcome::Routes(routes),
            Ok(None) => {
                debug!(iata, "Service reports no data for airport");
                return FetchOutcome::Skipped;
            }
            Err(e) if e.is_transient() => {
                if attempt >= max_attempts {
                    warn!(
                        iata,
                        attempts = max_attempts,
                        "Retries exhausted, dead-lettering airport"
                    );
                    return FetchOutcome::DeadLetter;
                }
                debug!(iata, attempt, error = %e, "Transient failure, backing off");
                sleep(backoff).await;
                attempt += 1;
                backoff *= 2;
            }
            Err(e) => {
                debug!(iata, error = %e, "Unusable response, dropping airport");
                return FetchOutcome::Skipped;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::route_api::{CannedResponse, CannedRouteApi};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn location(iata: &str, state: Option<&str>, country: &str) -> AirportLocation {
        AirportLocation {
            iata_code: iata.to_string(),
            county: None,
            state: state.map(str::to_string),
            country: country.to_string(),
            airport_lat: 0.0,
            airport_long: 0.0,
        }
    }

    fn fast_config() -> CollectorConfig {
        CollectorConfig {
            worker_count: 3,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    /// Counts every call that reaches the wrapped API.
    struct CountingApi {
        inner: CannedRouteApi,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RouteApi for CountingApi {
        async fn outbound_routes(
            &self,
            depart_iata: &str,
        ) -> Result<Option<Vec<RawRoute>>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.outbound_routes(depart_iata).await
        }
    }

    #[tokio::test]
    async fn test_collects_routes_for_known_arrivals() {
        let table = vec![
            location("AAA", None, "Testland"),
            location("BBB", Some("Testshire"), "Testland"),
        ];
        let api = Arc::new(CannedRouteApi::new(vec![RawRoute::arriving_at("BBB")]));

        let output = collect(
            api,
            table.clone(),
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(output.records.len(), 2);
        assert!(output.dead_letters.is_empty());
        for record in &output.records {
            assert_eq!(record.arrival_iata, "BBB");
            assert_eq!(record.arrival_state.as_deref(), Some("Testshire"));
        }
    }

    #[tokio::test]
    async fn test_unknown_arrival_is_dropped() {
        let table = vec![location("AAA", None, "Testland")];
        let api = Arc::new(CannedRouteApi::new(vec![RawRoute::arriving_at("XXX")]));

        let output = collect(
            api,
            table.clone(),
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert!(output.records.is_empty());
        assert!(output.dead_letters.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_airport_scoped() {
        // B always answers with the "no data" object; A's single route
        // arrives at an airport missing from the location table. Neither
        // failure affects the other airport's processing and nothing is
        // emitted.
        let departures = vec![
            location("AAA", None, "Testland"),
            location("BBB", None, "Testland"),
        ];
        let table = vec![location("AAA", None, "Testland")];
        let api = Arc::new(
            CannedRouteApi::new(vec![RawRoute::arriving_at("BBB")])
                .with_script("BBB", vec![CannedResponse::NoData]),
        );

        let output = collect(
            api,
            departures,
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert!(output.records.is_empty());
        assert!(output.dead_letters.is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_retried_until_success() {
        let table = vec![location("AAA", None, "Testland")];
        let api = Arc::new(CannedRouteApi::new(vec![RawRoute::arriving_at("AAA")]).with_script(
            "AAA",
            vec![
                CannedResponse::Reset,
                CannedResponse::Routes(vec![RawRoute::arriving_at("AAA")]),
            ],
        ));

        let output = collect(
            api,
            table.clone(),
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(output.records.len(), 1);
        assert!(output.dead_letters.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter_the_airport() {
        let table = vec![location("AAA", None, "Testland")];
        let api = Arc::new(
            CannedRouteApi::new(vec![RawRoute::arriving_at("AAA")])
                .with_script("AAA", vec![CannedResponse::Reset; 3]),
        );

        let output = collect(
            api,
            table.clone(),
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert!(output.records.is_empty());
        assert_eq!(output.dead_letters, vec!["AAA".to_string()]);
    }

    #[tokio::test]
    async fn test_all_work_drains_before_shutdown() {
        // Every departure is fetched exactly once, plus one extra call for
        // the scripted reset, before any worker observes the closed queue.
        let table: Vec<_> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .map(|iata| location(iata, None, "Testland"))
            .collect();
        let api = Arc::new(CountingApi {
            inner: CannedRouteApi::new(vec![RawRoute::arriving_at("AAA")])
                .with_script("CCC", vec![CannedResponse::Reset]),
            calls: AtomicUsize::new(0),
        });

        let output = collect(
            api.clone(),
            table.clone(),
            Arc::new(location_index(&table)),
            fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), table.len() + 1);
        assert_eq!(output.records.len(), table.len());
    }

    #[tokio::test]
    async fn test_worker_minimum_is_enforced() {
        let table = vec![location("AAA", None, "Testland")];
        let api = Arc::new(CannedRouteApi::default());

        let result = collect(
            api,
            table.clone(),
            Arc::new(location_index(&table)),
            CollectorConfig {
                worker_count: 1,
                ..fast_config()
            },
        )
        .await;

        assert!(result.is_err());
    }
}
