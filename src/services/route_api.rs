//! Trait and types for the external route-lookup service.

use crate::error::PipelineError;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A single route object as returned by the route service. Only the
/// arrival airport is needed downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRoute {
    #[serde(rename = "arrivalIata")]
    pub arrival_iata: String,
}

impl RawRoute {
    pub fn arriving_at(iata: impl Into<String>) -> Self {
        Self {
            arrival_iata: iata.into(),
        }
    }
}

/// Abstraction over a provider of outbound routes per departure airport.
///
/// `Ok(None)` means the service answered with a non-list body, which it
/// uses to signal "no data for this airport". A [`PipelineError`] that is
/// transient should be retried by the caller; any other error means the
/// response is unusable and the airport contributes nothing.
#[async_trait::async_trait]
pub trait RouteApi: Send + Sync {
    async fn outbound_routes(
        &self,
        depart_iata: &str,
    ) -> Result<Option<Vec<RawRoute>>, PipelineError>;
}

/// A scripted outcome for [`CannedRouteApi`].
#[derive(Debug, Clone)]
pub enum CannedResponse {
    Routes(Vec<RawRoute>),
    /// The non-list "no data" body.
    NoData,
    /// A connection reset.
    Reset,
}

/// In-memory [`RouteApi`] used by `--dry-run` and by tests.
///
/// Each airport can be given a queue of scripted outcomes which are
/// consumed one per call; once the script is exhausted (or for airports
/// without one) every call answers with the default route list.
pub struct CannedRouteApi {
    scripts: Mutex<HashMap<String, VecDeque<CannedResponse>>>,
    default: Vec<RawRoute>,
}

impl CannedRouteApi {
    pub fn new(default: Vec<RawRoute>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default,
        }
    }

    pub fn with_script(
        self,
        iata: impl Into<String>,
        responses: impl IntoIterator<Item = CannedResponse>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(iata.into(), responses.into_iter().collect());
        self
    }
}

impl Default for CannedRouteApi {
    /// One canned route arriving at `AAA`, mirroring what a real lookup
    /// returns for a small airport.
    fn default() -> Self {
        Self::new(vec![RawRoute::arriving_at("AAA")])
    }
}

#[async_trait::async_trait]
impl RouteApi for CannedRouteApi {
    async fn outbound_routes(
        &self,
        depart_iata: &str,
    ) -> Result<Option<Vec<RawRoute>>, PipelineError> {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(depart_iata)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(CannedResponse::Routes(routes)) => Ok(Some(routes)),
            Some(CannedResponse::NoData) => Ok(None),
            Some(CannedResponse::Reset) => {
                Err(PipelineError::transient(depart_iata, "canned reset"))
            }
            None => Ok(Some(self.default.clone())),
        }
    }
}
